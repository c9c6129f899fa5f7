//! Configuration types and loading for keg.
//!
//! The main entry point is [`KegConfig`], built by [`load_config`] from three
//! layers: built-in defaults, `<keg home>/config.yaml`, and `KEG_*`
//! environment variables (`__` separates nested keys, so
//! `KEG_HTTP__TIMEOUT_SECS=30` sets `http.timeout_secs`).

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file inside the keg home.
pub const CONFIG_FILE: &str = "config.yaml";

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "KEG_";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file or directory could not be accessed.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration could not be serialized to YAML.
    #[error("failed to write config file: {0}")]
    WriteError(#[from] serde_yaml::Error),

    /// A layer (file or environment) did not match the expected shape.
    #[error("invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// Neither `KEG_HOME` nor a home directory is available.
    #[error("cannot locate keg home (set KEG_HOME)")]
    HomeNotFound,

    /// A configuration value was invalid.
    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue {
        /// The configuration key that had an invalid value.
        key: String,
        /// A description of why the value is invalid.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// HTTP client settings used when fetching sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Overall timeout for one download, in seconds.
    pub timeout_secs: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: concat!("keg/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// The full keg configuration.
///
/// Every field has a default, so a partial `config.yaml` (or none at all)
/// is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KegConfig {
    /// Install root holding `Cellar/`. Defaults to the keg home.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Download cache. Defaults to `<keg home>/cache`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Extra directories searched for formula files, before `<keg home>/Formula`.
    pub formula_dirs: Vec<PathBuf>,

    /// Run the test stage after installing.
    pub run_tests: bool,

    /// Keep the build directory after a successful install.
    pub keep_build: bool,

    /// Value of `{{jobs}}` in command templates.
    pub jobs: usize,

    pub http: HttpConfig,
}

impl Default for KegConfig {
    fn default() -> Self {
        Self {
            root: None,
            cache_dir: None,
            formula_dirs: Vec::new(),
            run_tests: true,
            keep_build: false,
            jobs: default_jobs(),
            http: HttpConfig::default(),
        }
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Helper methods on KegConfig
// ---------------------------------------------------------------------------

impl KegConfig {
    /// The install root (the directory holding `Cellar/`).
    pub fn root_dir(&self, home: &Path) -> PathBuf {
        self.root.clone().unwrap_or_else(|| home.to_path_buf())
    }

    /// The download cache directory.
    pub fn cache_dir(&self, home: &Path) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| home.join("cache"))
    }

    /// Directories searched for formula files, in order.
    pub fn formula_search_dirs(&self, home: &Path) -> Vec<PathBuf> {
        let mut dirs = self.formula_dirs.clone();
        dirs.push(home.join("Formula"));
        dirs
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "http.user_agent".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// The layered configuration sources for the given keg home, lowest
/// precedence first.
pub fn figment(home: &Path) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(KegConfig::default()));
    let path = home.join(CONFIG_FILE);
    // An empty file is valid and contributes nothing.
    if std::fs::read_to_string(&path).is_ok_and(|s| !s.trim().is_empty()) {
        figment = figment.merge(Yaml::file(path));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration for the given keg home.
///
/// A missing `config.yaml` yields the defaults (plus any environment
/// overrides).
///
/// # Errors
///
/// Returns [`ConfigError::Extract`] if a layer has the wrong shape, or
/// [`ConfigError::InvalidValue`] if a value is out of range.
pub fn load_config(home: &Path) -> Result<KegConfig> {
    let config: KegConfig = figment(home).extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to `config.yaml` inside the given keg home.
///
/// The directory is created if it does not exist.
pub fn save_config(home: &Path, config: &KegConfig) -> Result<()> {
    let home = crate::keg_dir::ensure_dir(home)?;
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(home.join(CONFIG_FILE), yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
