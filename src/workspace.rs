use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    geometry::DetectorGeometry,
    wavelength::{WavelengthError, WavelengthRange},
};

#[derive(thiserror::Error, Debug)]
pub enum WorkspaceError {
    #[error("failed to open workspace file {1:?}")]
    Io(#[source] std::io::Error, String),
    #[error("failed to deserialize the workspace")]
    Json(#[from] serde_json::Error),
    #[error("inconsistent workspace: {0}")]
    Shape(String),
}
type Result<T> = std::result::Result<T, WorkspaceError>;

/// Detector counts binned in wavelength
///
/// `intensity` and `error` are ordered pixel by pixel, pixels row by row
/// (pixel `(i,j)` is at `j*nx+i`), and hold one value per wavelength bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub geometry: DetectorGeometry,
    /// Q range override `(qmin, qmax)` [1/Å]
    #[serde(default)]
    pub q_range: Option<(f64, f64)>,
    /// wavelength bin edges [Å]
    pub wavelength_edges: Vec<f64>,
    pub intensity: Vec<f64>,
    pub error: Vec<f64>,
}
impl Workspace {
    /// Loads a workspace from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| WorkspaceError::Io(e, path.as_ref().display().to_string()))?;
        log::info!("Loading {:?}...", path.as_ref());
        let this: Self = serde_json::from_reader(BufReader::new(file))?;
        this.validate()?;
        Ok(this)
    }
    pub fn n_wavelength_bins(&self) -> usize {
        self.wavelength_edges.len().saturating_sub(1)
    }
    /// Wavelength range from the first and last bin centers
    pub fn wavelength_range(&self) -> std::result::Result<WavelengthRange, WavelengthError> {
        WavelengthRange::from_bin_edges(&self.wavelength_edges)
    }
    /// Centers [Å] of the wavelength bins
    pub fn wavelength_centers(&self) -> Vec<f64> {
        self.wavelength_edges
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }
    /// Intensity and error of pixel `index` for each wavelength bin
    pub fn pixel(&self, index: usize) -> (&[f64], &[f64]) {
        let n = self.n_wavelength_bins();
        let range = index * n..(index + 1) * n;
        (&self.intensity[range.clone()], &self.error[range])
    }
    pub fn validate(&self) -> Result<()> {
        self.geometry
            .validate()
            .map_err(|e| WorkspaceError::Shape(e.to_string()))?;
        let n = self.geometry.n_pixels() * self.n_wavelength_bins();
        if self.intensity.len() != n || self.error.len() != n {
            return Err(WorkspaceError::Shape(format!(
                "expected {} values ({} pixels x {} wavelength bins), found {} intensities and {} errors",
                n,
                self.geometry.n_pixels(),
                self.n_wavelength_bins(),
                self.intensity.len(),
                self.error.len()
            )));
        }
        Ok(())
    }
}
