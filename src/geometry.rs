use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property key of the beam center x coordinate left by the beam finder
pub const LATEST_BEAM_CENTER_X: &str = "LatestBeamCenterX";
/// Property key of the beam center y coordinate left by the beam finder
pub const LATEST_BEAM_CENTER_Y: &str = "LatestBeamCenterY";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GeometryError {
    #[error("no beam center information can be found on the data set")]
    MissingBeamCenter,
    #[error("invalid detector geometry: {0}")]
    InvalidInput(String),
}
type Result<T> = std::result::Result<T, GeometryError>;

/// Beam center in detector pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamCenter {
    pub x: f64,
    pub y: f64,
}
impl BeamCenter {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
impl From<(f64, f64)> for BeamCenter {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Read-only keyed store of reduction properties
pub trait PropertyStore {
    fn property(&self, key: &str) -> Option<f64>;
}

/// In-memory property manager shared by the steps of a reduction
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PropertyManager(BTreeMap<String, f64>);
impl PropertyManager {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn set<S: Into<String>>(&mut self, key: S, value: f64) -> &mut Self {
        self.0.insert(key.into(), value);
        self
    }
    /// Records the beam center under the keys used as fallback by the Q binning
    pub fn set_latest_beam_center(&mut self, center: BeamCenter) -> &mut Self {
        self.set(LATEST_BEAM_CENTER_X, center.x)
            .set(LATEST_BEAM_CENTER_Y, center.y)
    }
}
impl PropertyStore for PropertyManager {
    fn property(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
}
impl From<BTreeMap<String, f64>> for PropertyManager {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

/// Resolves the beam center
///
/// The explicit value wins, otherwise both `LatestBeamCenterX` and `LatestBeamCenterY`
/// must be returned by `lookup`
pub fn resolve_beam_center<F>(explicit: Option<BeamCenter>, lookup: F) -> Result<BeamCenter>
where
    F: Fn(&str) -> Option<f64>,
{
    if let Some(center) = explicit {
        return Ok(center);
    }
    match (lookup(LATEST_BEAM_CENTER_X), lookup(LATEST_BEAM_CENTER_Y)) {
        (Some(x), Some(y)) => {
            log::debug!("beam center from property store: ({x}, {y})");
            Ok(BeamCenter { x, y })
        }
        _ => Err(GeometryError::MissingBeamCenter),
    }
}

/// Area detector description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorGeometry {
    /// pixel size along x [m]
    pub pixel_size_x: f64,
    /// pixel size along y [m]
    pub pixel_size_y: f64,
    /// number of pixels along x
    pub nx_pixels: usize,
    /// number of pixels along y
    pub ny_pixels: usize,
    /// sample to detector distance [m]
    pub sample_detector_distance: f64,
    /// beam center [pixel]
    #[serde(default)]
    pub beam_center: Option<BeamCenter>,
    /// beam trap diameter [m]
    #[serde(default)]
    pub beam_trap_diameter: Option<f64>,
}
impl DetectorGeometry {
    pub fn new(
        pixel_size: (f64, f64),
        n_pixels: (usize, usize),
        sample_detector_distance: f64,
    ) -> Self {
        Self {
            pixel_size_x: pixel_size.0,
            pixel_size_y: pixel_size.1,
            nx_pixels: n_pixels.0,
            ny_pixels: n_pixels.1,
            sample_detector_distance,
            beam_center: None,
            beam_trap_diameter: None,
        }
    }
    pub fn beam_center(self, center: impl Into<BeamCenter>) -> Self {
        Self {
            beam_center: Some(center.into()),
            ..self
        }
    }
    pub fn beam_trap_diameter(self, diameter: f64) -> Self {
        Self {
            beam_trap_diameter: Some(diameter),
            ..self
        }
    }
    pub fn n_pixels(&self) -> usize {
        self.nx_pixels * self.ny_pixels
    }
    /// Checks that sizes and distance are physical
    pub fn validate(&self) -> Result<()> {
        if !(self.pixel_size_x > 0. && self.pixel_size_y > 0.) {
            return Err(GeometryError::InvalidInput(format!(
                "pixel sizes must be positive, found ({}, {})",
                self.pixel_size_x, self.pixel_size_y
            )));
        }
        if self.nx_pixels == 0 || self.ny_pixels == 0 {
            return Err(GeometryError::InvalidInput(
                "the detector has no pixels".to_string(),
            ));
        }
        if !(self.sample_detector_distance > 0.) {
            return Err(GeometryError::InvalidInput(format!(
                "sample to detector distance must be positive, found {}",
                self.sample_detector_distance
            )));
        }
        Ok(())
    }
    /// Closest radial distance [m] from the direct beam where scattering is recorded
    ///
    /// Half the beam trap diameter or, without a beam trap, one pixel
    pub fn min_radial_distance(&self) -> f64 {
        self.beam_trap_diameter
            .map(|diameter| diameter / 2.)
            .unwrap_or_else(|| self.pixel_size_x.min(self.pixel_size_y))
    }
    /// Largest radial distance [m] from the beam center to the detector edges
    pub fn max_radial_distance(&self, center: &BeamCenter) -> f64 {
        let dxmax = self.pixel_size_x * center.x.max(self.nx_pixels as f64 - center.x);
        let dymax = self.pixel_size_y * center.y.max(self.ny_pixels as f64 - center.y);
        dxmax.hypot(dymax)
    }
    /// Scattering angle 2θ [rad] at radial distance `r` [m] on the detector
    pub fn scattering_angle(&self, r: f64) -> f64 {
        (r / self.sample_detector_distance).atan()
    }
    /// Offset [m] from the beam center of the detector point `(x,y)` [pixel]
    ///
    /// The center of pixel (i,j) is at `(i+0.5, j+0.5)`
    pub fn pixel_offset(&self, x: f64, y: f64, center: &BeamCenter) -> (f64, f64) {
        (
            (x - center.x) * self.pixel_size_x,
            (y - center.y) * self.pixel_size_y,
        )
    }
}

/// Momentum transfer [1/Å] at scattering angle `two_theta` [rad] and `wavelength` [Å]
pub fn momentum_transfer(two_theta: f64, wavelength: f64) -> f64 {
    4. * std::f64::consts::PI / wavelength * (0.5 * two_theta).sin()
}
