//! Q binning of the azimuthal average
//!
//! The binning follows the rebin parameter convention `(qmin, qstep, qmax)`:
//! a positive step is a constant bin width and a negative step is a logarithmic
//! binning where each edge is the previous one times `1 + |qstep|`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    geometry::{momentum_transfer, resolve_beam_center, DetectorGeometry, GeometryError},
    wavelength::{WavelengthError, WavelengthRange},
};

/// Tolerance on the fractional number of bins
///
/// Absorbs the rounding error of `(qmax-qmin)/((qmax-qmin)/n)` so that only a genuine
/// remainder moves the upper bound, not a physical threshold.
pub const BIN_EDGE_EPSILON: f64 = 1e-9;
/// Largest number of Q bins a binning may describe
pub const MAX_BINS: usize = 100_000;
/// Significant digits of [format_g]
const G_PRECISION: usize = 6;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BinningError {
    #[error("invalid Q binning: {0}")]
    InvalidInput(String),
    #[error("failed to parse Q binning {0:?}, expected \"qmin, qstep, qmax\"")]
    Parse(String),
    #[error("Q range cannot be derived from the detector geometry")]
    Geometry(#[from] GeometryError),
    #[error("Q range cannot be derived from the wavelength axis")]
    Wavelength(#[from] WavelengthError),
}
type Result<T> = std::result::Result<T, BinningError>;

/// Q bin spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum BinningMode {
    #[strum(to_string = "linear", serialize = "lin")]
    Linear,
    #[strum(to_string = "log", serialize = "logarithmic")]
    Logarithmic,
}

/// Q binning parameters `(qmin, qstep, qmax)` [1/Å]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BinningSpec {
    pub qmin: f64,
    pub qstep: f64,
    pub qmax: f64,
}
impl BinningSpec {
    pub fn new(qmin: f64, qstep: f64, qmax: f64) -> Self {
        Self { qmin, qstep, qmax }
    }
    /// Linear binning of `[qmin,qmax]` into `n_bins` bins
    ///
    /// `qmax` is pulled back to the last whole bin if the bin count is fractional
    pub fn linear(qmin: f64, qmax: f64, n_bins: usize) -> Result<Self> {
        check_range(qmin, qmax, n_bins)?;
        let qstep = (qmax - qmin) / n_bins as f64;
        let f_step = (qmax - qmin) / qstep;
        let n_step = f_step.floor();
        let qmax = if f_step - n_step > BIN_EDGE_EPSILON {
            qmin + qstep * n_step
        } else {
            qmax
        };
        Ok(Self { qmin, qstep, qmax })
    }
    /// Logarithmic binning of `[qmin,qmax]` into `n_bins` bins
    ///
    /// The returned step is `-(ratio-1)` with `ratio` the constant ratio of consecutive edges
    pub fn logarithmic(qmin: f64, qmax: f64, n_bins: usize) -> Result<Self> {
        check_range(qmin, qmax, n_bins)?;
        if qmin <= 0. {
            return Err(BinningError::InvalidInput(format!(
                "logarithmic binning needs a positive lower bound, found {qmin}"
            )));
        }
        let (log_qmin, log_qmax) = (qmin.log10(), qmax.log10());
        let qstep = (log_qmax - log_qmin) / n_bins as f64;
        let f_step = (log_qmax - log_qmin) / qstep;
        let n_step = f_step.floor();
        let qmax = if f_step - n_step > BIN_EDGE_EPSILON {
            10f64.powf(log_qmin + qstep * n_step)
        } else {
            qmax
        };
        Ok(Self {
            qmin,
            qstep: -(10f64.powf(qstep) - 1.),
            qmax,
        })
    }
    /// `true` for the all-zero triple meaning "compute the binning"
    pub fn is_unset(&self) -> bool {
        self.qmin == 0. && self.qstep == 0. && self.qmax == 0.
    }
    pub fn mode(&self) -> BinningMode {
        if self.qstep < 0. {
            BinningMode::Logarithmic
        } else {
            BinningMode::Linear
        }
    }
    /// Ratio of consecutive edges of a logarithmic binning
    pub fn ratio(&self) -> Option<f64> {
        match self.mode() {
            BinningMode::Logarithmic => Some(1. + self.qstep.abs()),
            BinningMode::Linear => None,
        }
    }
    pub fn validate(&self) -> Result<()> {
        if !(self.qmin.is_finite() && self.qstep.is_finite() && self.qmax.is_finite()) {
            return Err(BinningError::InvalidInput(format!(
                "non finite binning parameters: {self}"
            )));
        }
        if self.qmin >= self.qmax {
            return Err(BinningError::InvalidInput(format!(
                "qmin must be smaller than qmax: {self}"
            )));
        }
        if self.qstep == 0. {
            return Err(BinningError::InvalidInput(format!(
                "the Q step cannot be zero: {self}"
            )));
        }
        match self.ratio() {
            Some(_) if self.qmin <= 0. => {
                return Err(BinningError::InvalidInput(format!(
                    "logarithmic binning needs a positive qmin: {self}"
                )))
            }
            Some(ratio) if ratio <= 1. => {
                return Err(BinningError::InvalidInput(format!(
                    "the Q step is too small to increase the bin edges: {self}"
                )))
            }
            None if self.qmin + self.qstep == self.qmin => {
                return Err(BinningError::InvalidInput(format!(
                    "the Q step is too small to increase the bin edges: {self}"
                )))
            }
            _ => (),
        }
        self.n_bins().map(|_| ())
    }
    /// Number of bins from `qmin` to `qmax`
    ///
    /// A trailing remainder smaller than [BIN_EDGE_EPSILON] of a step does not count as a bin.
    fn n_bins(&self) -> Result<usize> {
        let f_step = match self.ratio() {
            Some(ratio) => (self.qmax / self.qmin).ln() / ratio.ln(),
            None => (self.qmax - self.qmin) / self.qstep,
        };
        let n = (f_step - BIN_EDGE_EPSILON).ceil().max(1.);
        if !n.is_finite() || n > MAX_BINS as f64 {
            return Err(BinningError::InvalidInput(format!(
                "{self} makes more than {MAX_BINS} bins"
            )));
        }
        Ok(n as usize)
    }
    /// Bin edges from `qmin` to `qmax`
    ///
    /// The last bin ends at `qmax` and may be narrower than the others; a remainder
    /// smaller than [BIN_EDGE_EPSILON] of a step is merged into the previous bin.
    pub fn edges(&self) -> Result<Vec<f64>> {
        self.validate()?;
        let n_bins = self.n_bins()?;
        let mut edges: Vec<f64> = match self.ratio() {
            Some(ratio) => (0..n_bins)
                .map(|k| self.qmin * ratio.powi(k as i32))
                .collect(),
            None => (0..n_bins)
                .map(|k| self.qmin + k as f64 * self.qstep)
                .collect(),
        };
        edges.push(self.qmax);
        Ok(edges)
    }
}
impl fmt::Display for BinningSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            format_g(self.qmin),
            format_g(self.qstep),
            format_g(self.qmax)
        )
    }
}
impl FromStr for BinningSpec {
    type Err = BinningError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|x| x.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| BinningError::Parse(s.to_string()))?;
        match values.as_slice() {
            &[qmin, qstep, qmax] => Ok(Self { qmin, qstep, qmax }),
            _ => Err(BinningError::Parse(s.to_string())),
        }
    }
}

fn check_range(qmin: f64, qmax: f64, n_bins: usize) -> Result<()> {
    if n_bins == 0 {
        return Err(BinningError::InvalidInput(
            "the number of bins must be at least 1".to_string(),
        ));
    }
    if !(qmin.is_finite() && qmax.is_finite()) || qmin >= qmax {
        return Err(BinningError::InvalidInput(format!(
            "degenerate Q range [{qmin}, {qmax}]"
        )));
    }
    Ok(())
}

/// Q range `(qmin, qmax)` [1/Å] seen by the detector
///
/// `qmin` is reached at the beam trap edge (or one pixel away from the beam) with the
/// longest wavelength and `qmax` at the detector corner the farthest from the beam
/// center with the shortest wavelength.
pub fn q_range<F>(
    geometry: &DetectorGeometry,
    wavelength: &WavelengthRange,
    lookup: F,
) -> Result<(f64, f64)>
where
    F: Fn(&str) -> Option<f64>,
{
    wavelength.validate()?;
    geometry.validate()?;
    let center = resolve_beam_center(geometry.beam_center, lookup)?;
    let qmin = momentum_transfer(
        geometry.scattering_angle(geometry.min_radial_distance()),
        wavelength.max,
    );
    let qmax = momentum_transfer(
        geometry.scattering_angle(geometry.max_radial_distance(&center)),
        wavelength.min,
    );
    log::debug!("Q range: [{qmin}, {qmax}]");
    Ok((qmin, qmax))
}

/// Computes the Q binning from the detector geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinningPlanner {
    number_of_bins: usize,
    log_binning: bool,
    q_range: Option<(f64, f64)>,
}
impl Default for BinningPlanner {
    fn default() -> Self {
        Self {
            number_of_bins: 100,
            log_binning: false,
            q_range: None,
        }
    }
}
impl BinningPlanner {
    pub fn number_of_bins(self, number_of_bins: usize) -> Self {
        Self {
            number_of_bins,
            ..self
        }
    }
    pub fn log_binning(self, log_binning: bool) -> Self {
        Self {
            log_binning,
            ..self
        }
    }
    /// Overrides the geometry derived Q range
    pub fn q_range(self, qmin: f64, qmax: f64) -> Self {
        Self {
            q_range: Some((qmin, qmax)),
            ..self
        }
    }
    pub fn maybe_q_range(self, q_range: Option<(f64, f64)>) -> Self {
        Self { q_range, ..self }
    }
    /// Returns the binning over the explicit Q range or, if not given,
    /// over the Q range derived with [q_range]
    pub fn plan<F>(
        &self,
        geometry: &DetectorGeometry,
        wavelength: &WavelengthRange,
        lookup: F,
    ) -> Result<BinningSpec>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let (qmin, qmax) = match self.q_range {
            Some(range) => range,
            None => q_range(geometry, wavelength, lookup)?,
        };
        if self.log_binning {
            BinningSpec::logarithmic(qmin, qmax, self.number_of_bins)
        } else {
            BinningSpec::linear(qmin, qmax, self.number_of_bins)
        }
    }
}

/// Formats a float like C `%g`: 6 significant digits, trailing zeros removed
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0. { "inf" } else { "-inf" }.to_string();
    }
    if value == 0. {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:.*e}", G_PRECISION - 1, value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or_default();
    if exponent < -4 || exponent >= G_PRECISION as i32 {
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else {
        let decimals = (G_PRECISION as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::geometry::{BeamCenter, PropertyManager, PropertyStore};

    #[test]
    fn linear_binning() -> std::result::Result<(), Box<dyn Error>> {
        let binning = BinningSpec::linear(0.01, 0.5, 10)?;
        assert!((binning.qstep - 0.049).abs() < 1e-15);
        assert_eq!(binning.qstep, (0.5 - 0.01) / 10.);
        assert_eq!(binning.qmax, 0.5);
        assert_eq!(binning.qmin, 0.01);
        assert_eq!(binning.mode(), BinningMode::Linear);
        Ok(())
    }

    #[test]
    fn linear_binning_snap() -> std::result::Result<(), Box<dyn Error>> {
        // (qmax-qmin)/qstep evaluates to 6.999999999999999
        let (qmin, qmax) = (0.003, 0.3021);
        let binning = BinningSpec::linear(qmin, qmax, 7)?;
        let qstep = (qmax - qmin) / 7.;
        assert_eq!(binning.qstep, qstep);
        assert_eq!(binning.qmax, qmin + qstep * 6.);
        assert!(binning.qmax < qmax);
        Ok(())
    }

    #[test]
    fn log_binning() -> std::result::Result<(), Box<dyn Error>> {
        let binning = BinningSpec::logarithmic(0.01, 1., 50)?;
        assert!(binning.qstep < 0.);
        assert_eq!(binning.mode(), BinningMode::Logarithmic);
        let ratio = 10f64.powf((1f64 / 0.01).log10() / 50.);
        assert!((1. + binning.qstep.abs() - ratio).abs() < 1e-12);
        assert_eq!(binning.qmin, 0.01);
        assert_eq!(binning.qmax, 1.);
        Ok(())
    }

    #[test]
    fn log_binning_snap() -> std::result::Result<(), Box<dyn Error>> {
        // the number of log steps evaluates to 14.999999999999998
        let (qmin, qmax) = (0.001, 0.3);
        let binning = BinningSpec::logarithmic(qmin, qmax, 15)?;
        let log_step = (qmax.log10() - qmin.log10()) / 15.;
        assert_eq!(binning.qmax, 10f64.powf(qmin.log10() + log_step * 14.));
        assert!(binning.qmax < qmax);
        assert_eq!(binning.qmin, qmin);
        assert_eq!(binning.qstep, -(10f64.powf(log_step) - 1.));
        Ok(())
    }

    #[test]
    fn steps_too_small() -> std::result::Result<(), Box<dyn Error>> {
        // 1 + 1e-17 == 1
        let binning: BinningSpec = "0.01, -1e-17, 0.5".parse()?;
        assert!(matches!(binning.validate(), Err(BinningError::InvalidInput(_))));
        assert!(binning.edges().is_err());
        // below the resolution of qmin
        let binning: BinningSpec = "1, 1e-300, 2".parse()?;
        assert!(matches!(binning.validate(), Err(BinningError::InvalidInput(_))));
        assert!(binning.edges().is_err());
        Ok(())
    }

    #[test]
    fn too_many_bins() {
        let binning = BinningSpec::new(0., 1e-9, 1.);
        assert!(matches!(binning.validate(), Err(BinningError::InvalidInput(_))));
        assert!(BinningSpec::new(1e-3, -1e-9, 1.).edges().is_err());
        let edges = BinningSpec::new(0., 1. / MAX_BINS as f64, 1.).edges();
        assert!(edges.is_ok_and(|edges| edges.len() <= MAX_BINS + 1));
    }

    #[test]
    fn degenerate_ranges() {
        assert!(matches!(
            BinningSpec::linear(0.5, 0.5, 10),
            Err(BinningError::InvalidInput(_))
        ));
        assert!(BinningSpec::linear(0.01, 0.5, 0).is_err());
        assert!(BinningSpec::logarithmic(0., 0.5, 10).is_err());
        assert!(BinningSpec::linear(f64::NAN, 0.5, 10).is_err());
        assert!(BinningSpec::new(0.1, 0., 0.2).validate().is_err());
        assert!(BinningSpec::new(0., -0.1, 0.2).validate().is_err());
    }

    #[test]
    fn linear_edges() -> std::result::Result<(), Box<dyn Error>> {
        let edges = BinningSpec::linear(0.01, 0.5, 10)?.edges()?;
        assert_eq!(edges.len(), 11);
        assert_eq!(edges[0], 0.01);
        assert_eq!(*edges.last().unwrap(), 0.5);
        assert!(edges.windows(2).all(|w| (w[1] - w[0] - 0.049).abs() < 1e-12));
        // partial last bin
        let edges = BinningSpec::new(0., 0.3, 1.).edges()?;
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[4], 1.);
        Ok(())
    }

    #[test]
    fn log_edges() -> std::result::Result<(), Box<dyn Error>> {
        let binning = BinningSpec::logarithmic(0.01, 1., 50)?;
        let edges = binning.edges()?;
        assert_eq!(edges.len(), 51);
        let ratio = binning.ratio().unwrap();
        assert!(edges
            .windows(2)
            .all(|w| (w[1] / w[0] - ratio).abs() < 1e-9));
        Ok(())
    }

    #[test]
    fn q_range_from_geometry() -> std::result::Result<(), Box<dyn Error>> {
        let geometry = DetectorGeometry::new((5e-3, 5e-3), (192, 192), 4.)
            .beam_center((96., 96.))
            .beam_trap_diameter(0.05);
        let wavelength = WavelengthRange::new(5., 7.)?;
        let (qmin, qmax) = q_range(&geometry, &wavelength, |_| None)?;
        let four_pi = 4. * std::f64::consts::PI;
        let expected_qmin = four_pi / 7. * (0.5 * (0.025f64 / 4.).atan()).sin();
        let maxdist = (5e-3 * 96f64).hypot(5e-3 * 96.);
        let expected_qmax = four_pi / 5. * (0.5 * (maxdist / 4.).atan()).sin();
        assert!((qmin - expected_qmin).abs() < 1e-12);
        assert!((qmax - expected_qmax).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn planner_missing_beam_center() {
        let geometry = DetectorGeometry::new((5e-3, 5e-3), (192, 192), 4.);
        let wavelength = WavelengthRange { min: 5., max: 7. };
        let store = PropertyManager::new();
        assert_eq!(
            BinningPlanner::default().plan(&geometry, &wavelength, |k| store.property(k)),
            Err(BinningError::Geometry(GeometryError::MissingBeamCenter))
        );
    }

    #[test]
    fn planner_store_fallback() -> std::result::Result<(), Box<dyn Error>> {
        let geometry = DetectorGeometry::new((5e-3, 5e-3), (192, 192), 4.);
        let wavelength = WavelengthRange { min: 5., max: 7. };
        let mut store = PropertyManager::new();
        store.set_latest_beam_center(BeamCenter::new(96., 96.));
        let binning = BinningPlanner::default()
            .number_of_bins(40)
            .log_binning(true)
            .plan(&geometry, &wavelength, |k| store.property(k))?;
        assert!(binning.qstep < 0.);
        assert!(binning.qmin > 0. && binning.qmin < binning.qmax);
        Ok(())
    }

    #[test]
    fn planner_q_range_override() -> std::result::Result<(), Box<dyn Error>> {
        let geometry = DetectorGeometry::new((5e-3, 5e-3), (192, 192), 4.);
        // neither the beam center nor the wavelengths are needed
        let wavelength = WavelengthRange { min: 0., max: 0. };
        let binning = BinningPlanner::default()
            .number_of_bins(10)
            .q_range(0.01, 0.5)
            .plan(&geometry, &wavelength, |_| None)?;
        assert_eq!(binning, BinningSpec::linear(0.01, 0.5, 10)?);
        Ok(())
    }

    #[test]
    fn planner_negative_wavelength() {
        let geometry = DetectorGeometry::new((5e-3, 5e-3), (192, 192), 4.).beam_center((96., 96.));
        let wavelength = WavelengthRange { min: -1., max: 7. };
        assert!(matches!(
            BinningPlanner::default().plan(&geometry, &wavelength, |_| None),
            Err(BinningError::Wavelength(WavelengthError::InvalidInput(..)))
        ));
    }

    #[test]
    fn display_and_parse() -> std::result::Result<(), Box<dyn Error>> {
        let binning = BinningSpec::new(0.001, -0.02, 0.35);
        assert_eq!(binning.to_string(), "0.001, -0.02, 0.35");
        let parsed: BinningSpec = "0.001, -0.02 ,0.35".parse()?;
        assert_eq!(parsed, binning);
        assert!("0.1,0.2".parse::<BinningSpec>().is_err());
        assert!("a,b,c".parse::<BinningSpec>().is_err());
        Ok(())
    }

    #[test]
    fn g_format() {
        assert_eq!(format_g(0.049), "0.049");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(100.), "100");
        assert_eq!(format_g(0.0123456789), "0.0123457");
        assert_eq!(format_g(1.5e-5), "1.5e-05");
        assert_eq!(format_g(123456789.), "1.23457e+08");
        assert_eq!(format_g(-0.478757636), "-0.478758");
        assert_eq!(format_g(0.), "0");
    }

    #[test]
    fn binning_modes() {
        let modes: Vec<_> = BinningMode::iter().map(|m| m.to_string()).collect();
        assert_eq!(modes, vec!["linear", "log"]);
        assert_eq!("logarithmic".parse::<BinningMode>(), Ok(BinningMode::Logarithmic));
    }
}
