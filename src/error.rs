use crate::{
    averaging::AveragingError,
    binning::BinningError,
    config::ConfigError,
    geometry::GeometryError,
    profile::ProfileError,
    reduction::ReductionError,
    wavelength::WavelengthError,
    workspace::WorkspaceError,
};

/// Classes of failure of a reduction
///
/// None of them is worth a retry: the same input fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed or physically invalid input
    InvalidInput,
    /// not enough data points to derive a range
    InsufficientData,
    /// the beam center cannot be resolved
    MissingBeamCenter,
    /// file system and (de)serialization failures
    Io,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `reduction` module")]
    Reduction(#[from] ReductionError),
    #[error("Error in the `binning` module")]
    Binning(#[from] BinningError),
    #[error("Error in the `averaging` module")]
    Averaging(#[from] AveragingError),
    #[error("Error in the `workspace` module")]
    Workspace(#[from] WorkspaceError),
    #[error("Error in the `profile` module")]
    Profile(#[from] ProfileError),
    #[error("Error in the `config` module")]
    Config(#[from] ConfigError),
}
impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Reduction(e) => e.kind(),
            Error::Binning(e) => e.kind(),
            Error::Averaging(AveragingError::Binning(e)) => e.kind(),
            Error::Averaging(AveragingError::Workspace(e)) | Error::Workspace(e) => e.kind(),
            Error::Averaging(AveragingError::Geometry(e)) => e.kind(),
            Error::Averaging(_) => ErrorKind::InvalidInput,
            Error::Profile(_) | Error::Config(_) => ErrorKind::Io,
        }
    }
}

impl GeometryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeometryError::MissingBeamCenter => ErrorKind::MissingBeamCenter,
            GeometryError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}
impl WavelengthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WavelengthError::InsufficientData(_) => ErrorKind::InsufficientData,
            WavelengthError::InvalidInput(..) => ErrorKind::InvalidInput,
        }
    }
}
impl BinningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BinningError::InvalidInput(_) | BinningError::Parse(_) => ErrorKind::InvalidInput,
            BinningError::Geometry(e) => e.kind(),
            BinningError::Wavelength(e) => e.kind(),
        }
    }
}
impl WorkspaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::Shape(_) => ErrorKind::InvalidInput,
            WorkspaceError::Io(..) | WorkspaceError::Json(_) => ErrorKind::Io,
        }
    }
}
