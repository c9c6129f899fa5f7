//! Runtime context for command execution.
//!
//! The [`RuntimeContext`] holds the global flags. Commands that touch the
//! keg home call [`RuntimeContext::workspace`], which loads the
//! configuration and resolves every directory the installer works in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use keg_build::{Cellar, Installer};
use keg_config::config::{KegConfig, load_config};
use keg_config::keg_dir::keg_home;
use keg_core::formula::Formula;
use keg_fetch::{DownloadCache, HttpFetcher, SchemeFetcher};
use keg_formula::parser::{find_formula, load_formula};

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Install root from `--root` / `KEG_ROOT`, overriding the config.
    pub root: Option<PathBuf>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

impl RuntimeContext {
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            root: global.root.clone(),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        }
    }

    /// Loads the configuration and resolves the keg home directories.
    pub fn workspace(&self) -> Result<Workspace> {
        let home = keg_home()?;
        let config = load_config(&home)
            .with_context(|| format!("failed to load configuration from {}", home.display()))?;
        let root = match &self.root {
            Some(root) => root.clone(),
            None => config.root_dir(&home),
        };
        let cwd = std::env::current_dir().context("cannot determine current directory")?;
        tracing::debug!(home = %home.display(), root = %root.display(), "resolved workspace");
        Ok(Workspace {
            cache_dir: config.cache_dir(&home),
            formula_dirs: config.formula_search_dirs(&home),
            home,
            root,
            cwd,
            config,
        })
    }

    /// Prints a progress line unless `--quiet` or `--json` is set.
    pub fn status(&self, line: &str) {
        if !self.quiet && !self.json {
            println!("{line}");
        }
    }
}

/// Directories and settings resolved from the keg home and its config.
#[derive(Debug)]
pub struct Workspace {
    pub home: PathBuf,
    pub config: KegConfig,
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub formula_dirs: Vec<PathBuf>,
    pub cwd: PathBuf,
}

impl Workspace {
    /// Locates `name` (a path, or a formula name searched in the current
    /// directory and then the formula directories) and parses it.
    pub fn load_formula(&self, name: &str) -> Result<Formula> {
        let path = self.find_formula(name)?;
        load_formula(&path).with_context(|| format!("failed to load formula {}", path.display()))
    }

    pub fn find_formula(&self, name: &str) -> Result<PathBuf> {
        Ok(find_formula(name, &self.cwd, &self.formula_dirs)?)
    }

    pub fn cellar(&self) -> Cellar {
        Cellar::new(&self.root)
    }

    pub fn download_cache(&self) -> DownloadCache {
        DownloadCache::new(&self.cache_dir)
    }

    /// A fetcher for every supported URL scheme, using the HTTP settings.
    pub fn fetcher(&self) -> SchemeFetcher {
        let http = &self.config.http;
        SchemeFetcher::new(HttpFetcher::new(
            http.user_agent.clone(),
            Duration::from_secs(http.timeout_secs),
        ))
    }

    pub fn installer<'a>(&self, fetcher: &'a SchemeFetcher) -> Installer<'a> {
        Installer::new(self.cellar(), self.download_cache(), fetcher)
    }

    pub fn config_path(&self) -> PathBuf {
        config_path(&self.home)
    }
}

pub fn config_path(home: &Path) -> PathBuf {
    home.join(keg_config::config::CONFIG_FILE)
}
