//! Core types for keg.
//!
//! A [`formula::Formula`] is the package descriptor: where to fetch a source
//! archive, which digest it must have, what it depends on and which commands
//! build, install and smoke-test it. This crate holds the record itself plus
//! the pure checks over it (checksums, version tokens, validation, and
//! version-succession history). Nothing here touches the network or runs
//! commands.

pub mod checksum;
pub mod formula;
pub mod history;
pub mod validation;
pub mod version;
