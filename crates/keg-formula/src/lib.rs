//! Formula file formats for keg.
//!
//! Formulas are written as TOML or JSON (one serde shape) or as the subset
//! of the Homebrew Ruby DSL that plain source formulas use. This crate
//! parses and emits all three, finds formula files by name, and expands the
//! `{{variable}}` templates used in build, install and test commands.

pub mod emit;
pub mod error;
pub mod parser;
pub mod ruby;
pub mod template;

pub use error::FormulaError;
