//! Formula validation rules.

use std::collections::HashSet;

use url::Url;

use crate::formula::{Formula, Step};
use crate::version::Version;

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name is required")]
    NameRequired,

    #[error("invalid name '{0}': use lowercase letters, digits, '+', '-', '.' or '_'")]
    InvalidName(String),

    #[error("source url is required")]
    UrlRequired,

    #[error("invalid source url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme '{0}' (expected http, https or file)")]
    UnsupportedScheme(String),

    #[error("homepage must be an http(s) url (got '{0}')")]
    InvalidHomepage(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("cannot determine version from url '{0}'")]
    UnknownVersion(String),

    #[error("source url '{url}' does not contain version '{version}'")]
    UrlVersionMismatch { url: String, version: String },

    #[error("duplicate dependency '{0}'")]
    DuplicateDependency(String),

    #[error("formula depends on itself")]
    SelfDependency,

    #[error("install procedure is empty")]
    EmptyInstall,

    #[error("{phase} step {index} is empty")]
    EmptyStep { phase: &'static str, index: usize },
}

/// Validates a formula, returning the first problem found.
pub fn validate(formula: &Formula) -> Result<(), ValidationError> {
    match lint(formula).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Collects every validation problem in a formula.
pub fn lint(formula: &Formula) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_name(&formula.name, &mut errors);
    check_source(formula, &mut errors);

    if !formula.homepage.is_empty() {
        let ok = Url::parse(&formula.homepage)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !ok {
            errors.push(ValidationError::InvalidHomepage(formula.homepage.clone()));
        }
    }

    let mut seen = HashSet::new();
    for dep in &formula.dependencies {
        if dep.name == formula.name {
            errors.push(ValidationError::SelfDependency);
        } else if !seen.insert(dep.name.as_str()) {
            errors.push(ValidationError::DuplicateDependency(dep.name.clone()));
        }
    }

    if formula.install.is_empty() {
        errors.push(ValidationError::EmptyInstall);
    }
    check_steps("build", &formula.build, &mut errors);
    check_steps("install", &formula.install, &mut errors);
    check_steps("test", &formula.test, &mut errors);

    errors
}

/// Returns `true` if `name` is a well-formed formula name.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '_'))
}

fn check_name(name: &str, errors: &mut Vec<ValidationError>) {
    if name.is_empty() {
        errors.push(ValidationError::NameRequired);
    } else if !is_valid_name(name) {
        errors.push(ValidationError::InvalidName(name.to_string()));
    }
}

fn check_source(formula: &Formula, errors: &mut Vec<ValidationError>) {
    let url = formula.source.url.trim();
    if url.is_empty() {
        errors.push(ValidationError::UrlRequired);
    } else {
        match Url::parse(url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https" | "file") {
                    errors.push(ValidationError::UnsupportedScheme(
                        parsed.scheme().to_string(),
                    ));
                }
            }
            Err(e) => errors.push(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if let Err(e) = formula.source.checksum() {
        errors.push(ValidationError::InvalidChecksum(e.to_string()));
    }

    if url.is_empty() {
        return;
    }
    match &formula.version {
        Some(explicit) => match Version::parse(explicit) {
            Ok(version) if !version.appears_in(url) => {
                errors.push(ValidationError::UrlVersionMismatch {
                    url: url.to_string(),
                    version: version.to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidVersion(e.to_string())),
        },
        None => {
            if Version::detect(url).is_none() {
                errors.push(ValidationError::UnknownVersion(url.to_string()));
            }
        }
    }
}

fn check_steps(phase: &'static str, steps: &[Step], errors: &mut Vec<ValidationError>) {
    for (index, step) in steps.iter().enumerate() {
        if step.is_empty() {
            errors.push(ValidationError::EmptyStep { phase, index });
        }
    }
}
