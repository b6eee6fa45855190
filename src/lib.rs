//! # SANS I(Q) reduction
//!
//! Azimuthal averaging of small-angle neutron scattering detector data into
//! the momentum transfer profile I(Q).
//!
//! A reduction goes through:
//!  1. the Q binning, either given or derived from the detector geometry and
//!     the wavelength range ([BinningPlanner]),
//!  2. the azimuthal average of the detector pixels ([AveragingEngine]),
//!  3. the replacement of NaN and infinite values in I(Q),
//!  4. optionally the Q resolution of each I(Q) point ([QResolution]).
//!
//! ```no_run
//! use sans_iq::{AzimuthalAverage, PropertyManager, WeightedRadialAverage, Workspace};
//!
//! let workspace = Workspace::from_json("run.json")?;
//! let reduction = AzimuthalAverage::default()
//!     .number_of_bins(100)
//!     .log_binning(true)
//!     .reduce(&workspace, &WeightedRadialAverage, &PropertyManager::new())?;
//! println!("{}", reduction.message);
//! reduction.profile.to_csv("iq.csv")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod averaging;
pub mod binning;
pub mod config;
pub mod error;
pub mod geometry;
#[cfg(feature = "plot")]
pub mod plot;
pub mod profile;
pub mod reduction;
pub mod resolution;
pub mod wavelength;
pub mod workspace;

pub use averaging::{
    Averaged, AveragingEngine, AveragingRequest, WedgeParameters, WeightedRadialAverage,
};
pub use binning::{
    format_g, BinningMode, BinningPlanner, BinningSpec, BIN_EDGE_EPSILON, MAX_BINS,
};
pub use config::ReductionConfig;
pub use error::{Error, ErrorKind};
pub use geometry::{
    resolve_beam_center, BeamCenter, DetectorGeometry, PropertyManager, PropertyStore,
};
pub use profile::{IqPoint, IqProfile, SpecialValues};
pub use reduction::{AzimuthalAverage, Reduction};
pub use resolution::{DirectBeamResolution, QResolution, ResolutionParameters};
pub use wavelength::WavelengthRange;
pub use workspace::Workspace;

pub type Result<T> = std::result::Result<T, Error>;
