//! Dependency resolution.
//!
//! A dependency is satisfied when any [`DependencyProvider`] can supply it.
//! Kegs in the cellar are preferred over tools found on `PATH`.

use std::path::{Path, PathBuf};

use keg_core::formula::{Dependency, DependencyStage};
use serde::Serialize;

use crate::cellar::Cellar;

/// Where a dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provision {
    /// An installed keg.
    Keg { version: String, prefix: PathBuf },
    /// An executable already on the system.
    System { path: PathBuf },
}

/// A dependency paired with what satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub stage: DependencyStage,
    pub provision: Provision,
}

/// A source of installed software.
pub trait DependencyProvider {
    fn provide(&self, name: &str) -> Option<Provision>;
}

/// Kegs with a receipt under `<root>/Cellar`.
#[derive(Debug, Clone)]
pub struct CellarProvider {
    cellar: Cellar,
}

impl CellarProvider {
    pub fn new(cellar: Cellar) -> Self {
        Self { cellar }
    }
}

impl DependencyProvider for CellarProvider {
    fn provide(&self, name: &str) -> Option<Provision> {
        self.cellar.latest(name).map(|r| Provision::Keg {
            version: r.version,
            prefix: r.prefix,
        })
    }
}

/// Executables in a list of directories, normally `$PATH`.
#[derive(Debug, Clone, Default)]
pub struct PathProvider {
    dirs: Vec<PathBuf>,
}

impl PathProvider {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_env() -> Self {
        let dirs = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        Self { dirs }
    }
}

impl DependencyProvider for PathProvider {
    fn provide(&self, name: &str) -> Option<Provision> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .map(|path| Provision::System { path })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolves every dependency against `providers`, first match wins.
///
/// Returns the names of all unsatisfied dependencies on failure.
pub fn resolve<'a>(
    deps: impl IntoIterator<Item = &'a Dependency>,
    providers: &[Box<dyn DependencyProvider + '_>],
) -> Result<Vec<ResolvedDependency>, Vec<String>> {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for dep in deps {
        match providers.iter().find_map(|p| p.provide(&dep.name)) {
            Some(provision) => {
                tracing::debug!(dependency = %dep.name, ?provision, "dependency satisfied");
                resolved.push(ResolvedDependency {
                    name: dep.name.clone(),
                    stage: dep.stage,
                    provision,
                });
            }
            None => missing.push(dep.name.clone()),
        }
    }
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(missing)
    }
}

/// Stages whose dependencies must be present before building.
pub fn required_stages(run_tests: bool) -> &'static [DependencyStage] {
    if run_tests {
        &[
            DependencyStage::Build,
            DependencyStage::Runtime,
            DependencyStage::Test,
        ]
    } else {
        &[DependencyStage::Build, DependencyStage::Runtime]
    }
}
