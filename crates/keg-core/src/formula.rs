//! The package descriptor.
//!
//! One [`Formula`] describes one released version of a package. It is
//! authored once and never mutated afterwards; a new release gets a new
//! descriptor. The serde shape here is shared by the TOML and JSON formula
//! files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum::{Checksum, ChecksumError, HashAlgorithm};
use crate::version::{Version, VersionError};

/// Root structure for `.toml` / `.json` formula files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Stable identifier, e.g. `mattext`.
    pub name: String,

    /// Explicit version. When absent it is detected from the source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Project homepage (informational).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub homepage: String,

    /// One-line description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub desc: String,

    /// Where the source archive lives and the digest it must have.
    pub source: Source,

    /// Packages required before (or while) building.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Explicit build phase. When empty, every install step but the last
    /// counts as build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<Step>,

    /// Ordered install procedure; any failing step aborts.
    #[serde(default)]
    pub install: Vec<Step>,

    /// Post-install smoke test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test: Vec<Step>,

    /// Where this formula was loaded from (set by the loader).
    #[serde(skip)]
    pub origin: String,
}

/// Source archive location and pinned digest.
///
/// The digest is kept as written so that a malformed value can still be
/// loaded and reported by validation; use [`Source::checksum`] to get the
/// checked form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
}

impl Source {
    /// Builds a source pinned with the given checksum.
    pub fn new(url: impl Into<String>, checksum: &Checksum) -> Self {
        let mut source = Self {
            url: url.into(),
            sha256: None,
            sha1: None,
        };
        match checksum.algorithm() {
            HashAlgorithm::Sha256 => source.sha256 = Some(checksum.hex().to_string()),
            HashAlgorithm::Sha1 => source.sha1 = Some(checksum.hex().to_string()),
        }
        source
    }

    /// Returns the validated checksum. Exactly one of `sha256` / `sha1` must
    /// be set.
    pub fn checksum(&self) -> Result<Checksum, ChecksumError> {
        match (&self.sha256, &self.sha1) {
            (Some(hex), None) => Checksum::new(HashAlgorithm::Sha256, hex),
            (None, Some(hex)) => Checksum::new(HashAlgorithm::Sha1, hex),
            (Some(_), Some(_)) => Err(ChecksumError::Conflicting),
            (None, None) => Err(ChecksumError::Missing),
        }
    }

    /// The last path segment of the URL, used to name cached downloads.
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(path)
    }
}

/// When a dependency is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStage {
    /// Needed at build time and afterwards.
    #[default]
    Runtime,
    /// Needed only while building.
    Build,
    /// Needed only to run the smoke test.
    Test,
    /// Used when present, never required.
    Optional,
}

impl DependencyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Build => "build",
            Self::Test => "test",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for DependencyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runtime" => Ok(Self::Runtime),
            "build" => Ok(Self::Build),
            "test" => Ok(Self::Test),
            "optional" => Ok(Self::Optional),
            other => Err(format!("unknown dependency stage: {other}")),
        }
    }
}

/// A named dependency, optionally scoped to a stage.
///
/// Serialized as a bare string for runtime dependencies and as
/// `{ name, stage }` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawDependency", into = "RawDependency")]
pub struct Dependency {
    pub name: String,
    pub stage: DependencyStage,
}

impl Dependency {
    pub fn new(name: impl Into<String>, stage: DependencyStage) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }

    pub fn runtime(name: impl Into<String>) -> Self {
        Self::new(name, DependencyStage::Runtime)
    }

    pub fn build(name: impl Into<String>) -> Self {
        Self::new(name, DependencyStage::Build)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            DependencyStage::Runtime => f.write_str(&self.name),
            stage => write!(f, "{} ({stage})", self.name),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        stage: DependencyStage,
    },
}

impl From<RawDependency> for Dependency {
    fn from(raw: RawDependency) -> Self {
        match raw {
            RawDependency::Name(name) => Self::runtime(name),
            RawDependency::Detailed { name, stage } => Self::new(name, stage),
        }
    }
}

impl From<Dependency> for RawDependency {
    fn from(dep: Dependency) -> Self {
        match dep.stage {
            DependencyStage::Runtime => Self::Name(dep.name),
            stage => Self::Detailed {
                name: dep.name,
                stage,
            },
        }
    }
}

/// One command in a build, install or test procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Step {
    /// Run through `sh -c`.
    Shell(String),
    /// Executed directly; the first element is the program.
    Exec(Vec<String>),
}

impl Step {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Shell(cmd) => cmd.trim().is_empty(),
            Self::Exec(argv) => argv.first().is_none_or(|p| p.trim().is_empty()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(cmd) => f.write_str(cmd),
            Self::Exec(argv) => {
                for (i, arg) in argv.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        write!(f, "'{arg}'")?;
                    } else {
                        f.write_str(arg)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The build/install split of a formula's procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Procedure<'a> {
    pub build: &'a [Step],
    pub install: &'a [Step],
}

impl Formula {
    /// Resolves the release version: the explicit field if set, otherwise
    /// detected from the source URL.
    pub fn version(&self) -> Result<Version, VersionError> {
        match &self.version {
            Some(v) => Version::parse(v),
            None => Version::detect(&self.source.url).ok_or(VersionError::Empty),
        }
    }

    /// Version as a display string, `"unknown"` when it cannot be resolved.
    pub fn version_label(&self) -> String {
        self.version()
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Dependencies needed at any of the given stages.
    pub fn dependencies_for<'a>(
        &'a self,
        stages: &'a [DependencyStage],
    ) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies
            .iter()
            .filter(move |d| stages.contains(&d.stage))
    }

    /// Splits the procedure into build and install phases.
    ///
    /// With an explicit `build` list the whole `install` list is the install
    /// phase. Otherwise the last install step is the install phase and the
    /// steps before it are the build phase (`cmake ./` then `make install`).
    pub fn procedure(&self) -> Procedure<'_> {
        if !self.build.is_empty() {
            return Procedure {
                build: &self.build,
                install: &self.install,
            };
        }
        match self.install.split_last() {
            Some((_, head)) if !head.is_empty() => Procedure {
                build: head,
                install: &self.install[head.len()..],
            },
            _ => Procedure {
                build: &[],
                install: &self.install,
            },
        }
    }
}
