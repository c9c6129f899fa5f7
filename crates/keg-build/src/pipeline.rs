//! The install pipeline: fetch → verify → resolve → build → install → test.
//!
//! Every stage must succeed before the next one starts, with one exception:
//! a failing test stage is recorded in the report and the keg stays
//! installed. Nothing is rolled back on failure; a keg without an install
//! receipt is simply not installed.

use std::fmt;
use std::path::{Path, PathBuf};

use keg_core::formula::{DependencyStage, Formula, Step};
use keg_core::validation::{ValidationError, is_valid_name, validate};
use keg_fetch::{DownloadCache, Fetcher, extract_archive};
use keg_formula::template::TemplateContext;
use keg_lockfile::LockFile;
use serde::Serialize;

use crate::cellar::Cellar;
use crate::deps::{
    CellarProvider, DependencyProvider, PathProvider, Provision, ResolvedDependency,
    required_stages, resolve,
};
use crate::error::InstallError;
use crate::receipt::{InstallReceipt, RECEIPT_FILE};
use crate::runner::StepRunner;

// ---------------------------------------------------------------------------
// Stages and reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Verify,
    Resolve,
    Build,
    Install,
    Test,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Verify => "verify",
            Self::Resolve => "resolve",
            Self::Build => "build",
            Self::Install => "install",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress callbacks. Both methods default to doing nothing.
pub trait StageListener {
    /// A stage is starting.
    fn stage(&self, _stage: Stage, _formula: &Formula, _detail: &str) {}

    /// A step of the build, install or test stage is about to run.
    fn step(&self, _stage: Stage, _command: &str) {}
}

pub struct NoopListener;

impl StageListener for NoopListener {}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub run_tests: bool,
    pub keep_build: bool,
    /// Reinstall over an existing keg of the same version.
    pub force: bool,
    pub jobs: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            run_tests: true,
            keep_build: false,
            force: false,
            jobs: 1,
        }
    }
}

/// Result of the test stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TestOutcome {
    Passed {
        steps: usize,
    },
    Failed {
        step: String,
        code: Option<i32>,
        output: String,
    },
    Skipped {
        reason: String,
    },
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub prefix: PathBuf,
    pub archive: PathBuf,
    pub cached_download: bool,
    pub dependencies: Vec<ResolvedDependency>,
    /// Build and install commands, expanded, in the order they ran.
    pub steps: Vec<String>,
    pub test: TestOutcome,
    /// Set when the build directory was kept.
    pub build_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDependency {
    pub name: String,
    pub stage: DependencyStage,
    /// `None` when nothing currently satisfies it.
    pub provision: Option<Provision>,
}

/// What [`Installer::install`] would do, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub name: String,
    pub version: String,
    pub prefix: PathBuf,
    pub archive: PathBuf,
    pub checksum: String,
    pub dependencies: Vec<PlannedDependency>,
    pub build: Vec<String>,
    pub install: Vec<String>,
    pub test: Vec<String>,
}

impl Plan {
    pub fn missing_dependencies(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|d| d.provision.is_none())
            .map(|d| d.name.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Installer
// ---------------------------------------------------------------------------

pub struct Installer<'a> {
    cellar: Cellar,
    cache: DownloadCache,
    fetcher: &'a dyn Fetcher,
    providers: Vec<Box<dyn DependencyProvider + 'a>>,
    listener: &'a dyn StageListener,
}

impl<'a> Installer<'a> {
    /// An installer resolving dependencies from the cellar, then `$PATH`.
    pub fn new(cellar: Cellar, cache: DownloadCache, fetcher: &'a dyn Fetcher) -> Self {
        let providers: Vec<Box<dyn DependencyProvider + 'a>> = vec![
            Box::new(CellarProvider::new(cellar.clone())),
            Box::new(PathProvider::from_env()),
        ];
        Self {
            cellar,
            cache,
            fetcher,
            providers,
            listener: &NoopListener,
        }
    }

    pub fn with_providers(mut self, providers: Vec<Box<dyn DependencyProvider + 'a>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_listener(mut self, listener: &'a dyn StageListener) -> Self {
        self.listener = listener;
        self
    }

    pub fn cellar(&self) -> &Cellar {
        &self.cellar
    }

    /// Validates `formula` and expands every command it would run.
    pub fn plan(&self, formula: &Formula, options: &InstallOptions) -> Result<Plan, InstallError> {
        validate(formula)?;
        let checksum = formula.source.checksum()?;
        let version = formula.version()?.to_string();
        let prefix = self.cellar.keg_path(&formula.name, &version);
        let ctx = template(formula, &prefix, options.jobs);
        let procedure = formula.procedure();
        let expand = |steps: &[Step]| -> Vec<String> {
            steps.iter().map(|s| ctx.expand(s).to_string()).collect()
        };

        Ok(Plan {
            name: formula.name.clone(),
            archive: self.cache.path_for(formula),
            checksum: checksum.to_string(),
            dependencies: formula
                .dependencies_for(required_stages(options.run_tests))
                .map(|d| PlannedDependency {
                    name: d.name.clone(),
                    stage: d.stage,
                    provision: self.providers.iter().find_map(|p| p.provide(&d.name)),
                })
                .collect(),
            build: expand(procedure.build),
            install: expand(procedure.install),
            test: if options.run_tests {
                expand(&formula.test)
            } else {
                Vec::new()
            },
            version,
            prefix,
        })
    }

    /// Runs the whole pipeline for `formula`.
    ///
    /// The per-formula lock is held from before the fetch until the test
    /// stage has finished.
    pub fn install(
        &self,
        formula: &Formula,
        options: &InstallOptions,
    ) -> Result<InstallReport, InstallError> {
        validate(formula)?;
        let checksum = formula.source.checksum()?;
        let version = formula.version()?.to_string();
        let name = formula.name.as_str();

        let _lock = LockFile::acquire(&self.cellar.lock_path(name))?;
        if !options.force && self.cellar.receipt(name, &version).is_some() {
            return Err(InstallError::AlreadyInstalled {
                name: name.to_string(),
                version,
            });
        }
        tracing::info!(name, %version, "installing");

        // fetch
        self.listener.stage(Stage::Fetch, formula, &formula.source.url);
        let download = self.cache.fetch(self.fetcher, formula, Some(&checksum))?;

        // verify
        self.listener.stage(Stage::Verify, formula, &checksum.to_string());
        checksum.verify_file(&download.path)?;

        // resolve
        let stages = required_stages(options.run_tests);
        self.listener.stage(Stage::Resolve, formula, &stage_names(stages));
        let dependencies = resolve(formula.dependencies_for(stages), &self.providers).map_err(
            |missing| InstallError::MissingDependency {
                name: name.to_string(),
                missing,
            },
        )?;

        let build_dir = self.cellar.build_dir(name, &version);
        remove_dir_if_exists(&build_dir)?;
        let source_root = extract_archive(&download.path, &build_dir)?;

        let prefix = self.cellar.keg_path(name, &version);
        remove_dir_if_exists(&prefix)?;
        std::fs::create_dir_all(&prefix).map_err(InstallError::io(&prefix))?;

        let ctx = template(formula, &prefix, options.jobs);
        let runner = with_env(
            StepRunner::new(&source_root),
            &prefix,
            false,
            &dependencies,
            options.jobs,
        );
        let procedure = formula.procedure();
        let mut steps = Vec::new();

        // build
        self.listener.stage(Stage::Build, formula, &source_root.display().to_string());
        for step in procedure.build {
            let step = ctx.expand(step);
            self.listener.step(Stage::Build, &step.to_string());
            let out = runner.run(&step).map_err(InstallError::BuildFailure)?;
            steps.push(out.command);
        }

        // install
        self.listener.stage(Stage::Install, formula, &prefix.display().to_string());
        for step in procedure.install {
            let step = ctx.expand(step);
            self.listener.step(Stage::Install, &step.to_string());
            let out = runner.run(&step).map_err(InstallError::InstallFailure)?;
            steps.push(out.command);
        }

        let receipt = InstallReceipt::new(formula, &version, &checksum.to_string(), &prefix);
        receipt
            .write()
            .map_err(InstallError::io(prefix.join(RECEIPT_FILE)))?;

        // test
        let test = if options.run_tests {
            self.test_stage(formula, &ctx, &prefix, &dependencies, options.jobs)?
        } else {
            TestOutcome::Skipped {
                reason: "tests disabled".to_string(),
            }
        };
        if test.is_failure() {
            tracing::warn!(name, %version, "test stage failed; keg left installed");
        }

        let build_dir = if options.keep_build {
            Some(build_dir)
        } else {
            if let Err(err) = std::fs::remove_dir_all(&build_dir) {
                tracing::warn!(dir = %build_dir.display(), error = %err, "failed to remove build directory");
            }
            None
        };

        Ok(InstallReport {
            name: name.to_string(),
            version,
            prefix,
            archive: download.path,
            cached_download: download.cached,
            dependencies,
            steps,
            test,
            build_dir,
        })
    }

    /// Runs the test stage against the installed keg of `formula`.
    pub fn run_tests(
        &self,
        formula: &Formula,
        options: &InstallOptions,
    ) -> Result<TestOutcome, InstallError> {
        check_name(&formula.name)?;
        let version = formula.version()?.to_string();
        let _lock = LockFile::acquire(&self.cellar.lock_path(&formula.name))?;
        let receipt = self
            .cellar
            .receipt(&formula.name, &version)
            .ok_or_else(|| InstallError::NotInstalled(format!("{} {version}", formula.name)))?;
        let dependencies = resolve(
            formula.dependencies_for(&[DependencyStage::Runtime, DependencyStage::Test]),
            &self.providers,
        )
        .map_err(|missing| InstallError::MissingDependency {
            name: formula.name.clone(),
            missing,
        })?;
        let ctx = template(formula, &receipt.prefix, options.jobs);
        self.test_stage(formula, &ctx, &receipt.prefix, &dependencies, options.jobs)
    }

    /// Removes one version of `name`, or every version when `version` is
    /// `None`. Returns the receipts of the removed kegs.
    pub fn uninstall(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Vec<InstallReceipt>, InstallError> {
        check_name(name)?;
        let _lock = LockFile::acquire(&self.cellar.lock_path(name))?;
        let targets = match version {
            Some(v) => self.cellar.receipt(name, v).into_iter().collect(),
            None => self.cellar.versions(name),
        };
        if targets.is_empty() {
            let label = match version {
                Some(v) => format!("{name} {v}"),
                None => name.to_string(),
            };
            return Err(InstallError::NotInstalled(label));
        }
        for receipt in &targets {
            std::fs::remove_dir_all(&receipt.prefix).map_err(InstallError::io(&receipt.prefix))?;
            tracing::info!(name, version = %receipt.version, "uninstalled");
        }
        // Only succeeds once no version is left.
        let _ = std::fs::remove_dir(self.cellar.cellar_dir().join(name));
        Ok(targets)
    }

    pub fn installed(&self) -> Vec<InstallReceipt> {
        self.cellar.installed()
    }

    fn test_stage(
        &self,
        formula: &Formula,
        ctx: &TemplateContext,
        prefix: &Path,
        dependencies: &[ResolvedDependency],
        jobs: usize,
    ) -> Result<TestOutcome, InstallError> {
        if formula.test.is_empty() {
            return Ok(TestOutcome::Skipped {
                reason: "formula has no test".to_string(),
            });
        }
        self.listener.stage(Stage::Test, formula, &prefix.display().to_string());
        let scratch = tempfile::tempdir().map_err(InstallError::io(std::env::temp_dir()))?;
        let runner = with_env(StepRunner::new(scratch.path()), prefix, true, dependencies, jobs);
        for step in &formula.test {
            let step = ctx.expand(step);
            self.listener.step(Stage::Test, &step.to_string());
            if let Err(err) = runner.run(&step) {
                return Ok(TestOutcome::Failed {
                    step: step.to_string(),
                    code: err.code(),
                    output: err.output().to_string(),
                });
            }
        }
        Ok(TestOutcome::Passed {
            steps: formula.test.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn template(formula: &Formula, prefix: &Path, jobs: usize) -> TemplateContext {
    TemplateContext::for_keg(formula, prefix, Path::new(&formula.origin), jobs)
}

/// Names reach the cellar as path components, so they must pass the same
/// check as a formula name before any join.
fn check_name(name: &str) -> Result<(), InstallError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()).into())
    }
}

/// Step environment: keg dependencies first on `PATH` and in
/// `CMAKE_PREFIX_PATH`, plus `MAKEFLAGS` for the job count. With
/// `own_bin`, the keg's own `bin` goes ahead of them on `PATH`.
fn with_env(
    runner: StepRunner,
    prefix: &Path,
    own_bin: bool,
    dependencies: &[ResolvedDependency],
    jobs: usize,
) -> StepRunner {
    let keg_prefixes: Vec<&PathBuf> = dependencies
        .iter()
        .filter_map(|d| match &d.provision {
            Provision::Keg { prefix, .. } => Some(prefix),
            Provision::System { .. } => None,
        })
        .collect();

    let mut runner = runner
        .env("KEG_PREFIX", prefix.as_os_str())
        .env("MAKEFLAGS", format!("-j{}", jobs.max(1)));

    let bin_dirs: Vec<PathBuf> = own_bin
        .then(|| prefix.join("bin"))
        .into_iter()
        .chain(keg_prefixes.iter().map(|p| p.join("bin")))
        .collect();
    if !bin_dirs.is_empty() {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let path = bin_dirs
            .into_iter()
            .chain(std::env::split_paths(&inherited));
        match std::env::join_paths(path) {
            Ok(path) => runner = runner.env("PATH", path),
            Err(err) => tracing::warn!(error = %err, "cannot extend PATH with keg bin directories"),
        }
    }
    if keg_prefixes.is_empty() {
        return runner;
    }
    if let Ok(cmake_path) = std::env::join_paths(keg_prefixes.iter().copied()) {
        runner = runner.env("CMAKE_PREFIX_PATH", cmake_path);
    }
    runner
}

fn stage_names(stages: &[DependencyStage]) -> String {
    stages
        .iter()
        .map(DependencyStage::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), InstallError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(InstallError::io(dir)(err)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
