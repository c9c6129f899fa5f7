use std::path::PathBuf;

use keg_core::checksum::{Checksum, ChecksumError};
use keg_core::validation::ValidationError;
use keg_core::version::VersionError;
use keg_fetch::FetchError;
use keg_lockfile::LockError;

use crate::runner::CommandError;

/// Why an install stopped.
///
/// Test failures are not errors; see [`crate::TestOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("invalid formula: {0}")]
    Invalid(#[from] ValidationError),

    #[error("invalid version: {0}")]
    Version(#[from] VersionError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: Checksum, actual: Checksum },

    #[error("cannot verify download: {0}")]
    Checksum(ChecksumError),

    #[error("missing dependencies for {name}: {}", missing.join(", "))]
    MissingDependency { name: String, missing: Vec<String> },

    #[error("build failed: {0}")]
    BuildFailure(#[source] CommandError),

    #[error("install failed: {0}")]
    InstallFailure(#[source] CommandError),

    #[error("{name} {version} is already installed")]
    AlreadyInstalled { name: String, version: String },

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ChecksumError> for InstallError {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::Mismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            other => Self::Checksum(other),
        }
    }
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// Output of the failed step, for build and install failures.
    pub fn step_output(&self) -> Option<&str> {
        match self {
            Self::BuildFailure(err) | Self::InstallFailure(err) => Some(err.output()),
            _ => None,
        }
    }
}
