//! The validate-and-install interpreter.
//!
//! [`Installer`] drives one formula through fetch, verify, dependency
//! resolution, build, install and test, leaving a keg under
//! `<root>/Cellar/<name>/<version>` with an install receipt.

pub mod cellar;
pub mod deps;
pub mod error;
pub mod pipeline;
pub mod receipt;
pub mod runner;

pub use cellar::Cellar;
pub use error::InstallError;
pub use pipeline::{
    InstallOptions, InstallReport, Installer, NoopListener, Plan, Stage, StageListener,
    TestOutcome,
};
pub use receipt::InstallReceipt;
