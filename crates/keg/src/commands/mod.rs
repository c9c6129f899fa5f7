//! Command handlers, one module per subcommand.

pub mod checksum;
pub mod completion;
pub mod config_cmd;
pub mod convert;
pub mod fetch;
pub mod history;
pub mod install;
pub mod list;
pub mod show;
pub mod uninstall;
pub mod validate;
pub mod version;
