use std::{
    collections::BTreeMap,
    env::{self, VarError},
    fs, io,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    averaging::WedgeParameters,
    binning::BinningSpec,
    geometry::PropertyManager,
    profile::SpecialValues,
    reduction::AzimuthalAverage,
    resolution::{DirectBeamResolution, ResolutionParameters},
};

/// Env variable with the path to the reduction configuration file
pub const CONFIG_ENV: &str = "SANS_IQ_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(r#""SANS_IQ_CONFIG" env var is not set"#)]
    Env(#[from] VarError),
    #[error("{1}")]
    ReadFile(#[source] io::Error, String),
    #[error("invalid reduction configuration")]
    Json(#[from] serde_json::Error),
    #[error("the number of Q bins must be at least 1")]
    NumberOfBins,
}
type Result<T> = std::result::Result<T, ConfigError>;

/// Reduction options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// positive step is linear bins, negative step is logarithmic bins
    pub binning: BinningSpec,
    /// number of Q bins to use if the binning is not supplied
    pub number_of_bins: usize,
    /// log binning in Q when the binning is not supplied
    pub log_binning: bool,
    /// number of sub-pixels per side of a detector pixel
    pub number_of_subpixels: usize,
    pub error_weighting: bool,
    /// Q resolution parameters, the resolution is computed only if set
    pub resolution: Option<ResolutionParameters>,
    pub wedges: WedgeParameters,
    pub special_values: SpecialValues,
    /// reduction properties, e.g. the `LatestBeamCenterX` and `LatestBeamCenterY` fallback
    pub properties: BTreeMap<String, f64>,
}
impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            binning: BinningSpec::default(),
            number_of_bins: 100,
            log_binning: false,
            number_of_subpixels: 1,
            error_weighting: false,
            resolution: None,
            wedges: WedgeParameters::default(),
            special_values: SpecialValues::default(),
            properties: BTreeMap::new(),
        }
    }
}
impl ReductionConfig {
    /// Loads the configuration from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let filename = path.as_ref().display().to_string();
        let contents =
            fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile(e, filename))?;
        let this: Self = serde_json::from_str(&contents)?;
        this.validate()?;
        Ok(this)
    }
    /// Loads the configuration from the file which path is given by the env variable `SANS_IQ_CONFIG`
    pub fn from_env() -> Result<Self> {
        let filename = env::var(CONFIG_ENV)?;
        Self::from_path(filename)
    }
    pub fn validate(&self) -> Result<()> {
        if self.number_of_bins == 0 {
            return Err(ConfigError::NumberOfBins);
        }
        Ok(())
    }
    pub fn property_manager(&self) -> PropertyManager {
        self.properties.clone().into()
    }
}
impl From<&ReductionConfig> for AzimuthalAverage {
    fn from(config: &ReductionConfig) -> Self {
        let reduction = AzimuthalAverage::default()
            .binning(config.binning)
            .number_of_bins(config.number_of_bins)
            .log_binning(config.log_binning)
            .number_of_subpixels(config.number_of_subpixels)
            .error_weighting(config.error_weighting)
            .wedges(config.wedges)
            .special_values(config.special_values);
        match config.resolution {
            Some(parameters) => {
                reduction.compute_resolution(DirectBeamResolution::from(parameters))
            }
            None => reduction,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::geometry::{PropertyStore, LATEST_BEAM_CENTER_X};

    #[test]
    fn defaults() -> std::result::Result<(), Box<dyn Error>> {
        let config: ReductionConfig = serde_json::from_str("{}")?;
        assert_eq!(config, ReductionConfig::default());
        assert!(config.binning.is_unset());
        assert_eq!(config.wedges.number, 2);
        assert_eq!(config.wedges.angle, 30.);
        Ok(())
    }

    #[test]
    fn partial() -> std::result::Result<(), Box<dyn Error>> {
        let config: ReductionConfig = serde_json::from_str(
            r#"{
                "number_of_bins": 50,
                "log_binning": true,
                "resolution": {"wavelength": 6.0, "delta_wavelength": 0.12, "beam_width": 2.5e-4},
                "properties": {"LatestBeamCenterX": 96.5, "LatestBeamCenterY": 95.0}
            }"#,
        )?;
        assert_eq!(config.number_of_bins, 50);
        assert!(config.log_binning);
        assert!(config.resolution.is_some());
        assert_eq!(config.property_manager().property(LATEST_BEAM_CENTER_X), Some(96.5));
        Ok(())
    }

    #[test]
    fn zero_bins() {
        let config = ReductionConfig {
            number_of_bins: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NumberOfBins)));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            ReductionConfig::from_path("no/such/config.json"),
            Err(ConfigError::ReadFile(..))
        ));
    }
}
