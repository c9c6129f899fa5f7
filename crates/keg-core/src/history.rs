//! Version-succession checks across the releases of one formula.
//!
//! Each release of a package gets its own immutable descriptor. Looking at
//! them side by side catches mistakes that a single descriptor cannot show:
//! two releases pinned to the same archive digest, a release whose URL
//! points at another version, or a dependency silently dropped.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::formula::Formula;
use crate::version::Version;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One observation about the release history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryFinding {
    MixedNames { expected: String, found: String },
    UnknownVersion { url: String },
    DuplicateVersion { version: String },
    ReusedChecksum { checksum: String, first: String, second: String },
    UrlVersionMismatch { version: String, url: String },
    DroppedDependency { from: String, to: String, dependency: String },
    InstallStepsChanged { from: String, to: String, before: usize, after: usize },
}

impl HistoryFinding {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MixedNames { .. }
            | Self::UnknownVersion { .. }
            | Self::DuplicateVersion { .. }
            | Self::ReusedChecksum { .. }
            | Self::UrlVersionMismatch { .. } => Severity::Error,
            Self::DroppedDependency { .. } => Severity::Warning,
            Self::InstallStepsChanged { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for HistoryFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MixedNames { expected, found } => {
                write!(f, "formula '{found}' mixed into history of '{expected}'")
            }
            Self::UnknownVersion { url } => write!(f, "cannot determine version of {url}"),
            Self::DuplicateVersion { version } => write!(f, "version {version} appears twice"),
            Self::ReusedChecksum {
                checksum,
                first,
                second,
            } => write!(f, "{first} and {second} share checksum {checksum}"),
            Self::UrlVersionMismatch { version, url } => {
                write!(f, "{version}: url {url} does not contain the version")
            }
            Self::DroppedDependency {
                from,
                to,
                dependency,
            } => write!(f, "{from} -> {to}: dependency '{dependency}' was dropped"),
            Self::InstallStepsChanged {
                from,
                to,
                before,
                after,
            } => write!(f, "{from} -> {to}: install steps changed from {before} to {after}"),
        }
    }
}

/// Dependency changes between two consecutive releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Result of [`check_history`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryReport {
    pub name: String,
    /// Releases in ascending version order.
    pub versions: Vec<String>,
    pub transitions: Vec<Transition>,
    pub findings: Vec<HistoryFinding>,
}

impl HistoryReport {
    /// `true` when no finding is an error.
    pub fn is_clean(&self) -> bool {
        self.findings
            .iter()
            .all(|f| f.severity() < Severity::Error)
    }
}

/// Checks a set of descriptors for one package as a release history.
///
/// The first formula's name is taken as the package name; descriptors with
/// another name are reported and left out. Releases whose version cannot be
/// resolved are reported and left out of the succession checks.
pub fn check_history(formulae: &[Formula]) -> HistoryReport {
    let mut findings = Vec::new();
    let name = formulae.first().map(|f| f.name.clone()).unwrap_or_default();

    let mut releases: Vec<(Version, &Formula)> = Vec::new();
    for formula in formulae {
        if formula.name != name {
            findings.push(HistoryFinding::MixedNames {
                expected: name.clone(),
                found: formula.name.clone(),
            });
            continue;
        }
        match formula.version() {
            Ok(v) => releases.push((v, formula)),
            Err(_) => findings.push(HistoryFinding::UnknownVersion {
                url: formula.source.url.clone(),
            }),
        }
    }
    releases.sort_by(|a, b| a.0.cmp(&b.0));

    let mut by_checksum: HashMap<String, String> = HashMap::new();
    for (version, formula) in &releases {
        if !version.appears_in(&formula.source.url) {
            findings.push(HistoryFinding::UrlVersionMismatch {
                version: version.to_string(),
                url: formula.source.url.clone(),
            });
        }
        if let Ok(checksum) = formula.source.checksum() {
            let key = checksum.to_string();
            if let Some(first) = by_checksum.get(&key) {
                findings.push(HistoryFinding::ReusedChecksum {
                    checksum: key,
                    first: first.clone(),
                    second: version.to_string(),
                });
            } else {
                by_checksum.insert(key, version.to_string());
            }
        }
    }

    let mut transitions = Vec::new();
    for pair in releases.windows(2) {
        let (prev_v, prev) = &pair[0];
        let (next_v, next) = &pair[1];
        let from = prev_v.to_string();
        let to = next_v.to_string();

        if prev_v == next_v {
            findings.push(HistoryFinding::DuplicateVersion { version: to });
            continue;
        }

        let before: BTreeSet<&str> = prev.dependencies.iter().map(|d| d.name.as_str()).collect();
        let after: BTreeSet<&str> = next.dependencies.iter().map(|d| d.name.as_str()).collect();
        let removed: Vec<String> = before.difference(&after).map(|s| s.to_string()).collect();
        for dependency in &removed {
            findings.push(HistoryFinding::DroppedDependency {
                from: from.clone(),
                to: to.clone(),
                dependency: dependency.clone(),
            });
        }

        if prev.install.len() != next.install.len() {
            findings.push(HistoryFinding::InstallStepsChanged {
                from: from.clone(),
                to: to.clone(),
                before: prev.install.len(),
                after: next.install.len(),
            });
        }

        transitions.push(Transition {
            added: after.difference(&before).map(|s| s.to_string()).collect(),
            removed,
            from,
            to,
        });
    }

    HistoryReport {
        name,
        versions: releases.iter().map(|(v, _)| v.to_string()).collect(),
        transitions,
        findings,
    }
}
