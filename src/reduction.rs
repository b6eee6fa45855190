use std::sync::Arc;

use crate::{
    averaging::{AveragingEngine, AveragingError, AveragingRequest, WedgeParameters},
    binning::{format_g, BinningError, BinningPlanner, BinningSpec},
    error::ErrorKind,
    geometry::{resolve_beam_center, PropertyStore},
    profile::{IqProfile, SpecialValues},
    resolution::QResolution,
    wavelength::WavelengthError,
    workspace::Workspace,
};

#[derive(thiserror::Error, Debug)]
pub enum ReductionError {
    #[error("invalid wavelength axis")]
    Wavelength(#[from] WavelengthError),
    #[error("failed to compute the Q binning")]
    Binning(#[from] BinningError),
    #[error("azimuthal averaging failed")]
    Averaging(#[from] AveragingError),
}
impl ReductionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReductionError::Wavelength(e) => e.kind(),
            ReductionError::Binning(e) => e.kind(),
            ReductionError::Averaging(AveragingError::Binning(e)) => e.kind(),
            ReductionError::Averaging(AveragingError::Geometry(e)) => e.kind(),
            ReductionError::Averaging(_) => ErrorKind::InvalidInput,
        }
    }
}
type Result<T> = std::result::Result<T, ReductionError>;

/// Result of an azimuthal average
#[derive(Debug, Clone)]
pub struct Reduction {
    /// I(Q)
    pub profile: IqProfile,
    /// I(Q) of each wedge
    pub wedges: Vec<IqProfile>,
    /// the binning that has been used
    pub binning: BinningSpec,
    /// provenance message
    pub message: String,
}

/// I(Q) reduction of a SANS workspace
///
/// Builds the Q binning (unless given), runs the averaging engine, cleans the
/// special values and optionally computes the Q resolution.
#[derive(Clone)]
pub struct AzimuthalAverage {
    binning: BinningSpec,
    number_of_bins: usize,
    log_binning: bool,
    n_subpixels: usize,
    error_weighting: bool,
    resolution: Option<Arc<dyn QResolution + Send + Sync>>,
    wedges: WedgeParameters,
    special_values: SpecialValues,
}
impl Default for AzimuthalAverage {
    fn default() -> Self {
        Self {
            binning: BinningSpec::default(),
            number_of_bins: 100,
            log_binning: false,
            n_subpixels: 1,
            error_weighting: false,
            resolution: None,
            wedges: WedgeParameters::default(),
            special_values: SpecialValues::default(),
        }
    }
}
impl AzimuthalAverage {
    /// Explicit Q binning, the all-zero binning lets the geometry decide
    pub fn binning(self, binning: BinningSpec) -> Self {
        Self { binning, ..self }
    }
    /// Number of Q bins if the binning is not given
    pub fn number_of_bins(self, number_of_bins: usize) -> Self {
        Self {
            number_of_bins,
            ..self
        }
    }
    /// Logarithmic Q bins if the binning is not given
    pub fn log_binning(self, log_binning: bool) -> Self {
        Self {
            log_binning,
            ..self
        }
    }
    pub fn number_of_subpixels(self, n_subpixels: usize) -> Self {
        Self {
            n_subpixels,
            ..self
        }
    }
    pub fn error_weighting(self, error_weighting: bool) -> Self {
        Self {
            error_weighting,
            ..self
        }
    }
    /// Attaches the Q resolution computed with `resolution` to I(Q)
    pub fn compute_resolution<R>(self, resolution: R) -> Self
    where
        R: QResolution + Send + Sync + 'static,
    {
        Self {
            resolution: Some(Arc::new(resolution)),
            ..self
        }
    }
    pub fn wedges(self, wedges: WedgeParameters) -> Self {
        Self { wedges, ..self }
    }
    pub fn special_values(self, special_values: SpecialValues) -> Self {
        Self {
            special_values,
            ..self
        }
    }
    /// Returns the binning to use with `workspace`
    pub fn resolve_binning<S>(&self, workspace: &Workspace, store: &S) -> Result<BinningSpec>
    where
        S: PropertyStore + ?Sized,
    {
        if !self.binning.is_unset() {
            self.binning.validate()?;
            return Ok(self.binning);
        }
        let wavelength = workspace.wavelength_range()?;
        let binning = BinningPlanner::default()
            .number_of_bins(self.number_of_bins)
            .log_binning(self.log_binning)
            .maybe_q_range(workspace.q_range)
            .plan(&workspace.geometry, &wavelength, |key| store.property(key))?;
        log::info!("Q binning: {binning}");
        Ok(binning)
    }
    /// Reduces `workspace` to I(Q) with `engine`
    ///
    /// `store` is the fallback source of the beam center. The beam center is only
    /// required by the binning derived from the geometry and by the engine itself.
    pub fn reduce<E, S>(&self, workspace: &Workspace, engine: &E, store: &S) -> Result<Reduction>
    where
        E: AveragingEngine + ?Sized,
        S: PropertyStore + ?Sized,
    {
        if self.error_weighting {
            log::warn!("The ErrorWeighting option is turned ON. This option is NOT RECOMMENDED");
        }
        if self.n_subpixels != 1 {
            log::warn!(
                "NumberOfSubpixels was set to {}: The recommended value is 1",
                self.n_subpixels
            );
        }

        let binning = self.resolve_binning(workspace, store)?;
        let beam_center =
            resolve_beam_center(workspace.geometry.beam_center, |key| store.property(key)).ok();
        if beam_center.is_none() {
            log::debug!("no beam center for the averaging engine");
        }

        let averaged = engine.average(&AveragingRequest {
            workspace,
            beam_center,
            binning,
            wedges: self.wedges,
            n_subpixels: self.n_subpixels,
            error_weighting: self.error_weighting,
        })?;

        let mut profile = averaged.profile;
        let n_replaced = profile.replace_special_values(&self.special_values);
        log::debug!("{n_replaced} special value(s) replaced in I(Q)");
        let mut wedges = averaged.wedges;
        wedges.iter_mut().for_each(|wedge| {
            wedge.replace_special_values(&self.special_values);
        });

        if let Some(resolution) = &self.resolution {
            profile.attach_resolution(resolution.as_ref());
        }

        let message = format!(
            "Performed radial averaging between Q={} and Q={}",
            format_g(binning.qmin),
            format_g(binning.qmax)
        );
        log::info!("{message}");
        Ok(Reduction {
            profile,
            wedges,
            binning,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::{
        averaging::{Averaged, WeightedRadialAverage},
        geometry::{BeamCenter, DetectorGeometry, PropertyManager},
        profile::IqPoint,
        resolution::DirectBeamResolution,
    };

    fn workspace() -> Workspace {
        let (nx, ny) = (48, 48);
        Workspace {
            geometry: DetectorGeometry::new((5e-3, 5e-3), (nx, ny), 4.),
            q_range: None,
            wavelength_edges: vec![5., 6., 7.],
            intensity: vec![4.; nx * ny * 2],
            error: vec![2.; nx * ny * 2],
        }
    }

    fn centered() -> Workspace {
        let mut ws = workspace();
        ws.geometry = ws.geometry.beam_center((24., 24.));
        ws
    }

    /// Engine echoing the binning with one non-finite bin
    struct Echo;
    impl AveragingEngine for Echo {
        fn average(
            &self,
            request: &AveragingRequest<'_>,
        ) -> std::result::Result<Averaged, AveragingError> {
            let b = request.binning;
            Ok(Averaged {
                profile: vec![
                    IqPoint::new(b.qmin, f64::NAN, f64::NAN),
                    IqPoint::new(b.qmax, f64::INFINITY, 1.),
                ]
                .into(),
                wedges: vec![vec![IqPoint::new(b.qmin, f64::NAN, 0.)].into()],
            })
        }
    }

    #[test]
    fn explicit_binning() -> std::result::Result<(), Box<dyn Error>> {
        let mut ws = workspace();
        // the binning must depend on neither the wavelengths nor the beam center
        ws.wavelength_edges = vec![6.];
        let binning = BinningSpec::new(0.01, 0.049, 0.5);
        let reduction = AzimuthalAverage::default().binning(binning).reduce(
            &ws,
            &Echo,
            &PropertyManager::new(),
        )?;
        assert_eq!(reduction.binning, binning);
        assert_eq!(
            reduction.message,
            "Performed radial averaging between Q=0.01 and Q=0.5"
        );
        Ok(())
    }

    #[test]
    fn explicit_binning_beam_center() -> std::result::Result<(), Box<dyn Error>> {
        let ws = workspace();
        let reduction = AzimuthalAverage::default()
            .binning(BinningSpec::new(0.001, 0.0025, 0.05))
            .wedges(WedgeParameters::none());
        let store = PropertyManager::new();
        assert!(reduction.reduce(&ws, &Echo, &store).is_ok());
        let err = reduction
            .reduce(&ws, &WeightedRadialAverage, &store)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingBeamCenter);
        let mut store = PropertyManager::new();
        store.set_latest_beam_center(BeamCenter::new(24., 24.));
        let result = reduction.reduce(&ws, &WeightedRadialAverage, &store)?;
        assert!(result.wedges.is_empty());
        assert_eq!(result.profile.len(), 20);
        Ok(())
    }

    #[test]
    fn q_range_override_without_beam_center() -> std::result::Result<(), Box<dyn Error>> {
        let mut ws = workspace();
        ws.q_range = Some((0.01, 0.5));
        let reduction = AzimuthalAverage::default().number_of_bins(10).reduce(
            &ws,
            &Echo,
            &PropertyManager::new(),
        )?;
        assert_eq!(reduction.binning, BinningSpec::linear(0.01, 0.5, 10)?);
        Ok(())
    }

    #[test]
    fn special_values_cleaned() -> std::result::Result<(), Box<dyn Error>> {
        let ws = centered();
        let reduction = AzimuthalAverage::default().reduce(&ws, &Echo, &PropertyManager::new())?;
        assert!(reduction
            .profile
            .iter()
            .all(|p| p.intensity == 0. && p.error == 0.));
        assert_eq!(reduction.wedges[0][0].intensity, 0.);
        Ok(())
    }

    #[test]
    fn missing_beam_center() {
        let err = AzimuthalAverage::default()
            .reduce(&workspace(), &Echo, &PropertyManager::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingBeamCenter);
    }

    #[test]
    fn insufficient_wavelength_data() {
        let mut ws = centered();
        ws.wavelength_edges = vec![6.];
        let err = AzimuthalAverage::default()
            .reduce(&ws, &Echo, &PropertyManager::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn non_positive_wavelengths() {
        let mut ws = centered();
        ws.wavelength_edges = vec![0., 0., 7.];
        let err = AzimuthalAverage::default()
            .reduce(&ws, &Echo, &PropertyManager::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn degenerate_explicit_binning() {
        let ws = centered();
        let err = AzimuthalAverage::default()
            .binning(BinningSpec::new(0.5, 0.01, 0.1))
            .reduce(&ws, &Echo, &PropertyManager::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn full_reduction() -> std::result::Result<(), Box<dyn Error>> {
        let mut store = PropertyManager::new();
        store.set_latest_beam_center(BeamCenter::new(24., 24.));
        let resolution = DirectBeamResolution::new(6., 0.12, 2.5e-4);
        let reduction = AzimuthalAverage::default()
            .number_of_bins(30)
            .log_binning(true)
            .compute_resolution(resolution)
            .reduce(&workspace(), &WeightedRadialAverage, &store)?;
        assert!(reduction.binning.qstep < 0.);
        assert_eq!(reduction.wedges.len(), 2);
        assert!(reduction
            .profile
            .iter()
            .all(|p| p.intensity.is_finite() && p.error.is_finite()));
        assert!(reduction
            .profile
            .iter()
            .filter(|p| p.intensity != 0.)
            .all(|p| (p.intensity - 4.).abs() < 1e-12));
        assert!(reduction
            .profile
            .iter()
            .all(|p| p.sigma_q == Some(resolution.delta_q_scalar(p.q))));
        assert!(reduction.message.starts_with("Performed radial averaging between Q="));
        Ok(())
    }
}
