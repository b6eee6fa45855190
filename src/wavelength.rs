use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WavelengthError {
    #[error("azimuthal averaging expects at least one wavelength bin, found {0} bin edge(s)")]
    InsufficientData(usize),
    #[error("azimuthal averaging needs positive wavelengths, found [{0}, {1}]")]
    InvalidInput(f64, f64),
}
type Result<T> = std::result::Result<T, WavelengthError>;

/// Wavelength bounds [Å] of a measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub min: f64,
    pub max: f64,
}
impl WavelengthRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let this = Self { min, max };
        this.validate()?;
        Ok(this)
    }
    /// Derives the range from the centers of the first and last wavelength bins
    pub fn from_bin_edges(edges: &[f64]) -> Result<Self> {
        let n = edges.len();
        if n < 2 {
            return Err(WavelengthError::InsufficientData(n));
        }
        Self::new(0.5 * (edges[0] + edges[1]), 0.5 * (edges[n - 2] + edges[n - 1]))
    }
    pub fn validate(&self) -> Result<()> {
        if self.min > 0. && self.max > 0. && self.max >= self.min {
            Ok(())
        } else {
            Err(WavelengthError::InvalidInput(self.min, self.max))
        }
    }
}
