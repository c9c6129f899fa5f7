//! Configuration management for keg.
//!
//! This crate locates the keg home directory (`$KEG_HOME` or `~/.keg`),
//! loads `config.yaml` from it layered with `KEG_*` environment variables,
//! and resolves the directories the installer works in.

pub mod config;
pub mod keg_dir;
