use std::{
    io,
    ops::{Deref, DerefMut},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{binning::format_g, resolution::QResolution};

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("failed to read or write the I(Q) CSV file")]
    Csv(#[from] csv::Error),
    #[error("failed to flush the I(Q) CSV file")]
    Io(#[from] io::Error),
}
type Result<T> = std::result::Result<T, ProfileError>;

/// I(Q) data point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IqPoint {
    #[serde(rename = "Q (1/A)")]
    pub q: f64,
    #[serde(rename = "I(Q)")]
    pub intensity: f64,
    #[serde(rename = "Error")]
    pub error: f64,
    #[serde(rename = "Sigma Q (1/A)")]
    pub sigma_q: Option<f64>,
}
impl IqPoint {
    pub fn new(q: f64, intensity: f64, error: f64) -> Self {
        Self {
            q,
            intensity,
            error,
            sigma_q: None,
        }
    }
}

/// Replacement values for NaN and infinite intensities and errors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecialValues {
    pub nan_value: f64,
    pub nan_error: f64,
    pub infinity_value: f64,
    pub infinity_error: f64,
}

/// Azimuthally averaged intensity
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IqProfile(Vec<IqPoint>);
impl Deref for IqProfile {
    type Target = Vec<IqPoint>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl DerefMut for IqProfile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
impl From<Vec<IqPoint>> for IqProfile {
    fn from(points: Vec<IqPoint>) -> Self {
        Self(points)
    }
}
impl FromIterator<IqPoint> for IqProfile {
    fn from_iter<T: IntoIterator<Item = IqPoint>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
impl IqProfile {
    pub fn q(&self) -> Vec<f64> {
        self.iter().map(|p| p.q).collect()
    }
    pub fn intensity(&self) -> Vec<f64> {
        self.iter().map(|p| p.intensity).collect()
    }
    /// Returns the Q range of the profile
    pub fn q_range(&self) -> Option<(f64, f64)> {
        let first = self.first()?;
        let last = self.last()?;
        Some((first.q, last.q))
    }
    /// Replaces NaN and infinite intensities and errors
    ///
    /// Returns the number of points that have been modified
    pub fn replace_special_values(&mut self, values: &SpecialValues) -> usize {
        let mut n_replaced = 0;
        for point in self.iter_mut() {
            let mut replaced = false;
            if point.intensity.is_nan() || point.error.is_nan() {
                point.intensity = values.nan_value;
                point.error = values.nan_error;
                replaced = true;
            }
            if point.intensity.is_infinite() || point.error.is_infinite() {
                point.intensity = values.infinity_value;
                point.error = values.infinity_error;
                replaced = true;
            }
            if replaced {
                n_replaced += 1;
            }
        }
        n_replaced
    }
    /// Sets the Q resolution of every point
    pub fn attach_resolution<R: QResolution + ?Sized>(&mut self, resolution: &R) -> &mut Self {
        let sigma_q = resolution.delta_q_sequence(&self.q());
        self.iter_mut()
            .zip(sigma_q)
            .for_each(|(point, dq)| point.sigma_q = Some(dq));
        self
    }
    /// Writes the profile to a CSV file
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let wtr = csv::Writer::from_path(path)?;
        self.write_csv(wtr)
    }
    pub fn write_csv<W: io::Write>(&self, mut wtr: csv::Writer<W>) -> Result<()> {
        for point in self.iter() {
            wtr.serialize(point)?;
        }
        wtr.flush()?;
        Ok(())
    }
    /// Loads a profile written by [IqProfile::to_csv]
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = csv::Reader::from_path(path)?;
        Self::read_csv(rdr)
    }
    pub fn read_csv<R: io::Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
        Ok(Self(
            rdr.deserialize()
                .collect::<std::result::Result<Vec<IqPoint>, csv::Error>>()?,
        ))
    }
    pub fn summary(&self) {
        let max_value = |x: &[f64]| x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_value = |x: &[f64]| x.iter().cloned().fold(f64::INFINITY, f64::min);

        println!("I(Q) SUMMARY:");
        println!(" - # of points: {}", self.len());
        let Some((qmin, qmax)) = self.q_range() else {
            return;
        };
        println!(" - Q range: [{}, {}] 1/A", format_g(qmin), format_g(qmax));
        let intensity = self.intensity();
        println!(
            " - I(Q) range: [{:.6e}, {:.6e}]",
            min_value(&intensity),
            max_value(&intensity)
        );
        let n_empty = self.iter().filter(|p| p.intensity == 0.).count();
        println!(" - # of empty bins: {}", n_empty);
        println!(
            "    {:^12} {:^14} {:^14} {:^12}",
            "Q", "I(Q)", "ERROR", "SIGMA Q"
        );
        for point in self.iter() {
            println!(
                "    {:>12.6} {:>14.6e} {:>14.6e} {:>12}",
                point.q,
                point.intensity,
                point.error,
                point
                    .sigma_q
                    .map(|dq| format!("{:.6}", dq))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
}
