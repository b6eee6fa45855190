//! Azimuthal averaging engines
//!
//! An engine turns the detector counts of a [Workspace] into I(Q) for a given
//! [BinningSpec], together with one I(Q) per wedge.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    binning::{BinningError, BinningSpec},
    geometry::{momentum_transfer, BeamCenter, GeometryError},
    profile::{IqPoint, IqProfile},
    workspace::{Workspace, WorkspaceError},
};

#[derive(thiserror::Error, Debug)]
pub enum AveragingError {
    #[error("the workspace cannot be averaged")]
    Workspace(#[from] WorkspaceError),
    #[error("the Q bin edges cannot be built")]
    Binning(#[from] BinningError),
    #[error("the detector geometry cannot be averaged")]
    Geometry(#[from] GeometryError),
    #[error("the number of sub-pixels must be at least 1")]
    SubPixels,
}
type Result<T> = std::result::Result<T, AveragingError>;

/// Angular sectors of the detector
///
/// Wedge `k` is centered at `offset + k*180/number` degrees and is `angle` degrees wide.
/// Each wedge is symmetric through the beam center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WedgeParameters {
    pub number: usize,
    /// angular opening [deg]
    pub angle: f64,
    /// angular offset [deg]
    pub offset: f64,
}
impl Default for WedgeParameters {
    fn default() -> Self {
        Self {
            number: 2,
            angle: 30.,
            offset: 0.,
        }
    }
}
impl WedgeParameters {
    pub fn none() -> Self {
        Self {
            number: 0,
            ..Default::default()
        }
    }
    /// Center [deg] of wedge `k`
    pub fn center(&self, k: usize) -> f64 {
        self.offset + 180. * k as f64 / self.number as f64
    }
    /// Indices of the wedges containing the azimuthal angle `phi` [rad]
    fn containing(&self, phi: f64) -> impl Iterator<Item = usize> + '_ {
        let cos_half_angle = (0.5 * self.angle).to_radians().cos();
        (0..self.number)
            .filter(move |&k| (phi - self.center(k).to_radians()).cos().abs() >= cos_half_angle)
    }
}

/// Everything an engine needs to average a workspace
#[derive(Debug, Clone)]
pub struct AveragingRequest<'a> {
    pub workspace: &'a Workspace,
    /// `None` if the beam center could not be resolved
    pub beam_center: Option<BeamCenter>,
    pub binning: BinningSpec,
    pub wedges: WedgeParameters,
    /// sub-pixels per side of a detector pixel
    pub n_subpixels: usize,
    /// weights each contribution with its inverse variance
    pub error_weighting: bool,
}

/// Azimuthally averaged intensity and wedges
#[derive(Debug, Clone, Default)]
pub struct Averaged {
    pub profile: IqProfile,
    pub wedges: Vec<IqProfile>,
}

/// Azimuthal averaging engine
pub trait AveragingEngine {
    fn average(&self, request: &AveragingRequest<'_>) -> Result<Averaged>;
}

/// Weighted sums of one I(Q)
#[derive(Debug, Clone)]
struct Accumulator {
    sum_w: Vec<f64>,
    sum_wi: Vec<f64>,
    sum_w2e2: Vec<f64>,
}
impl Accumulator {
    fn new(n_bins: usize) -> Self {
        Self {
            sum_w: vec![0.; n_bins],
            sum_wi: vec![0.; n_bins],
            sum_w2e2: vec![0.; n_bins],
        }
    }
    fn add(&mut self, bin: usize, weight: f64, intensity: f64, error: f64) {
        self.sum_w[bin] += weight;
        self.sum_wi[bin] += weight * intensity;
        self.sum_w2e2[bin] += weight * weight * error * error;
    }
    fn merge(mut self, other: Self) -> Self {
        for (a, b) in [
            (&mut self.sum_w, &other.sum_w),
            (&mut self.sum_wi, &other.sum_wi),
            (&mut self.sum_w2e2, &other.sum_w2e2),
        ] {
            a.iter_mut().zip(b).for_each(|(a, b)| *a += b);
        }
        self
    }
    /// Empty bins are 0/0, i.e. NaN
    fn into_profile(self, edges: &[f64]) -> IqProfile {
        edges
            .windows(2)
            .zip(self.sum_w)
            .zip(self.sum_wi)
            .zip(self.sum_w2e2)
            .map(|(((q, w), wi), w2e2)| {
                IqPoint::new(0.5 * (q[0] + q[1]), wi / w, w2e2.sqrt() / w)
            })
            .collect()
    }
}

/// Sums for the full average followed by one per wedge
#[derive(Debug, Clone)]
struct Accumulators(Vec<Accumulator>);
impl Accumulators {
    fn new(n_bins: usize, n_wedges: usize) -> Self {
        Self(vec![Accumulator::new(n_bins); 1 + n_wedges])
    }
    fn merge(self, other: Self) -> Self {
        Self(
            self.0
                .into_iter()
                .zip(other.0)
                .map(|(a, b)| a.merge(b))
                .collect(),
        )
    }
}

/// Weighted average of the pixels falling in each Q bin
///
/// Every (pixel, wavelength bin) pair contributes to the Q bin of its scattering angle
/// and bin center wavelength with a weight of 1, or of 1/σ² with error weighting.
/// The intensity is `Σ w I / Σ w` and its error `√(Σ w² σ²) / Σ w`.
/// Non-finite pixel values are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedRadialAverage;
impl AveragingEngine for WeightedRadialAverage {
    fn average(&self, request: &AveragingRequest<'_>) -> Result<Averaged> {
        let AveragingRequest {
            workspace,
            beam_center,
            binning,
            wedges,
            n_subpixels,
            error_weighting,
        } = request;
        if *n_subpixels == 0 {
            return Err(AveragingError::SubPixels);
        }
        let beam_center = beam_center.ok_or(GeometryError::MissingBeamCenter)?;
        workspace.validate()?;
        let edges = binning.edges()?;
        let n_bins = edges.len() - 1;
        let (qmin, qmax) = (edges[0], edges[n_bins]);
        let wavelengths = workspace.wavelength_centers();
        let geometry = &workspace.geometry;
        let nx = geometry.nx_pixels;
        let n_sub = *n_subpixels as f64;
        log::debug!(
            "averaging {} pixels into {} Q bins and {} wedges",
            geometry.n_pixels(),
            n_bins,
            wedges.number
        );

        let accumulators = (0..geometry.n_pixels())
            .into_par_iter()
            .fold(
                || {
                    (
                        Accumulators::new(n_bins, wedges.number),
                        Vec::<usize>::with_capacity(wedges.number),
                    )
                },
                |(mut acc, mut in_wedges), index| {
                    let (i, j) = (index % nx, index / nx);
                    let (intensity, error) = workspace.pixel(index);
                    for (si, sj) in (0..*n_subpixels)
                        .flat_map(|si| (0..*n_subpixels).map(move |sj| (si, sj)))
                    {
                        let (x, y) = geometry.pixel_offset(
                            i as f64 + (si as f64 + 0.5) / n_sub,
                            j as f64 + (sj as f64 + 0.5) / n_sub,
                            &beam_center,
                        );
                        let two_theta = geometry.scattering_angle(x.hypot(y));
                        let phi = y.atan2(x);
                        in_wedges.clear();
                        in_wedges.extend(wedges.containing(phi));
                        for ((&wavelength, &value), &sigma) in
                            wavelengths.iter().zip(intensity).zip(error)
                        {
                            if !(value.is_finite() && sigma.is_finite()) {
                                continue;
                            }
                            let weight = if *error_weighting {
                                if sigma == 0. {
                                    continue;
                                }
                                1. / (sigma * sigma)
                            } else {
                                1.
                            };
                            let q = momentum_transfer(two_theta, wavelength);
                            if q < qmin || q > qmax {
                                continue;
                            }
                            let bin = edges
                                .partition_point(|&edge| edge <= q)
                                .saturating_sub(1)
                                .min(n_bins - 1);
                            acc.0[0].add(bin, weight, value, sigma);
                            for &k in &in_wedges {
                                acc.0[1 + k].add(bin, weight, value, sigma);
                            }
                        }
                    }
                    (acc, in_wedges)
                },
            )
            .map(|(acc, _)| acc)
            .reduce(
                || Accumulators::new(n_bins, wedges.number),
                Accumulators::merge,
            );

        let mut profiles = accumulators
            .0
            .into_iter()
            .map(|acc| acc.into_profile(&edges));
        let profile = profiles.next().unwrap_or_default();
        Ok(Averaged {
            profile,
            wedges: profiles.collect(),
        })
    }
}
