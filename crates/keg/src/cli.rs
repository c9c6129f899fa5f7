//! Clap CLI definitions for the `keg` command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// keg -- build and install packages from source formulas.
#[derive(Parser, Debug)]
#[command(
    name = "keg",
    about = "Validate, fetch and install package formulas",
    long_about = "A formula pins a source archive by checksum and lists the dependencies and \
                  commands that build, install and smoke-test it. keg checks formulas, \
                  fetches and verifies their sources, and installs them into a cellar.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Install root holding the cellar (default: config `root`, else the keg home).
    #[arg(long, global = true, env = "KEG_ROOT")]
    pub root: Option<PathBuf>,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // ===== Formulas =====
    /// Check formulas for errors.
    #[command(alias = "lint")]
    Validate(ValidateArgs),

    /// Show a parsed formula.
    #[command(alias = "info")]
    Show(ShowArgs),

    /// Re-emit a formula in another format.
    Convert(ConvertArgs),

    /// Compute the digest of a file.
    Checksum(ChecksumArgs),

    /// Check a set of formulas as the release history of one package.
    History(HistoryArgs),

    // ===== Installing =====
    /// Download and verify a formula's source archive.
    Fetch(FetchArgs),

    /// Fetch, build and install a formula.
    Install(InstallArgs),

    /// Run the test stage of an installed formula.
    Test(TestArgs),

    /// List installed kegs.
    #[command(alias = "ls")]
    List,

    /// Remove an installed keg.
    #[command(alias = "rm", disable_version_flag = true)]
    Uninstall(UninstallArgs),

    // ===== Setup =====
    /// Show the effective configuration.
    Config(ConfigArgs),

    /// Generate shell completion scripts.
    Completion(CompletionArgs),

    /// Print version information.
    Version,
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Arguments for `keg validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Formula names or paths.
    #[arg(required = true)]
    pub formulas: Vec<String>,
}

/// Arguments for `keg show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Formula name or path.
    pub formula: String,
}

/// Target format of `keg convert`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvertFormat {
    Toml,
    Json,
    Ruby,
}

/// Arguments for `keg convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Formula name or path.
    pub formula: String,

    /// Output format.
    #[arg(long, value_enum)]
    pub to: ConvertFormat,

    /// Write to a file instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Digest algorithm for `keg checksum`.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlgorithmArg {
    Sha1,
    #[default]
    Sha256,
}

/// Arguments for `keg checksum`.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// File to hash.
    pub file: PathBuf,

    /// Digest algorithm.
    #[arg(long, value_enum, default_value_t = AlgorithmArg::Sha256)]
    pub algorithm: AlgorithmArg,
}

/// Arguments for `keg history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Formula files, or directories of formula files.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Installing
// ---------------------------------------------------------------------------

/// Arguments for `keg fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Formula name or path.
    pub formula: String,

    /// Discard any cached download first.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `keg install`.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Formula name or path.
    pub formula: String,

    /// Skip the test stage.
    #[arg(long)]
    pub no_test: bool,

    /// Print the commands that would run, without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the build directory after installing.
    #[arg(long)]
    pub keep_build: bool,

    /// Reinstall even if this version is already installed.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Parallel jobs for the build (default: config `jobs`).
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

/// Arguments for `keg test`.
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Formula name or path.
    pub formula: String,
}

/// Arguments for `keg uninstall`.
#[derive(Args, Debug)]
pub struct UninstallArgs {
    /// Package name.
    pub name: String,

    /// Remove only this version (default: every installed version).
    #[arg(long)]
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

/// Arguments for `keg config`.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommands>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (the default).
    Show,
    /// Print the path of the configuration file.
    Path,
    /// Write a `config.yaml` holding the default settings.
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for `keg completion`.
#[derive(Args, Debug)]
pub struct CompletionArgs {
    #[command(subcommand)]
    pub command: CompletionCommands,
}

/// Supported shells.
#[derive(Subcommand, Debug)]
pub enum CompletionCommands {
    /// Generate bash completions.
    Bash,
    /// Generate zsh completions.
    Zsh,
    /// Generate fish completions.
    Fish,
    /// Generate PowerShell completions.
    Powershell,
}
