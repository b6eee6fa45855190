use serde::{Deserialize, Serialize};

/// Q resolution function
pub trait QResolution {
    /// Returns the absolute Q resolution sigma_Q [1/Å] at `q` [1/Å]
    fn delta_q_scalar(&self, q: f64) -> f64;
    /// Element-wise [QResolution::delta_q_scalar], in the order of `q`
    fn delta_q_sequence(&self, q: &[f64]) -> Vec<f64> {
        q.iter().map(|&q| self.delta_q_scalar(q)).collect()
    }
}

/// Parameters of [DirectBeamResolution]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionParameters {
    /// constant wavelength [Å]
    pub wavelength: f64,
    /// relative wavelength resolution
    pub delta_wavelength: f64,
    /// fitted horizontal beam width resolution [rad]
    pub beam_width: f64,
}

/// Parametrized Q resolution of a monochromatic beam
///
/// sigma_Q² = q² c Δλ² + Δθ² (k² - q²) with k = 4π/λ and c = (1/(2√(2ln2)))²
/// converting a relative FWHM into a Gaussian variance.
///
/// Above the elastic limit (q > k) the variance may be negative and sigma_Q is NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectBeamResolution {
    // squared
    delta_wavelength: f64,
    // squared
    delta_theta: f64,
    k: f64,
}
impl DirectBeamResolution {
    pub fn new(wavelength: f64, delta_wavelength: f64, beam_width: f64) -> Self {
        Self {
            delta_wavelength: delta_wavelength * delta_wavelength,
            delta_theta: beam_width * beam_width,
            k: 4. * std::f64::consts::PI / wavelength,
        }
    }
    /// Elastic scattering limit 4π/λ [1/Å]
    pub fn k(&self) -> f64 {
        self.k
    }
    /// Variance prefactor of the relative wavelength spread
    pub fn wavelength_coeff() -> f64 {
        (1. / (2. * (2. * 2f64.ln()).sqrt())).powi(2)
    }
}
impl From<ResolutionParameters> for DirectBeamResolution {
    fn from(p: ResolutionParameters) -> Self {
        Self::new(p.wavelength, p.delta_wavelength, p.beam_width)
    }
}
impl QResolution for DirectBeamResolution {
    fn delta_q_scalar(&self, q: f64) -> f64 {
        let q2 = q * q;
        (q2 * Self::wavelength_coeff() * self.delta_wavelength
            + self.delta_theta * (self.k * self.k - q2))
            .sqrt()
    }
}
