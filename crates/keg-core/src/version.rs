//! Release version tokens.
//!
//! Versions are compared the way package managers compare release tags:
//! split into numeric and alphabetic runs, numbers compared numerically,
//! missing trailing components treated as zero, and a pre-release suffix
//! (`2.0rc1`) sorting before the plain release (`2.0`).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Archive extensions stripped before looking for a version in a file name.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".tbz2", ".txz", ".tar", ".zip",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("version is empty")]
    Empty,

    #[error("invalid version '{0}': must start with a digit")]
    NoLeadingDigit(String),

    #[error("invalid character '{ch}' in version '{version}'")]
    InvalidChar { version: String, ch: char },
}

/// A release version such as `0.8` or `1.2.3rc1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Num(u64),
    Alpha(&'a str),
}

impl Version {
    /// Parses a version string. A leading `v` is dropped (`v0.8` -> `0.8`).
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let s = s.strip_prefix(['v', 'V']).unwrap_or(s);
        if s.is_empty() {
            return Err(VersionError::Empty);
        }
        if !s.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(VersionError::NoLeadingDigit(s.to_string()));
        }
        if let Some(ch) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+')))
        {
            return Err(VersionError::InvalidChar {
                version: s.to_string(),
                ch,
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Detects the version from the file name of a source URL.
    ///
    /// Handles GitHub tag archives (`.../archive/v0.8.tar.gz`) and the
    /// conventional `name-1.2.3.tar.gz`. Returns `None` when no segment of
    /// the file name looks like a version.
    pub fn detect(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next()?;
        let file = path.trim_end_matches('/').rsplit('/').next()?;
        let stem = strip_archive_extension(file);

        // Walk dash/underscore separated segments from the right.
        stem.rsplit(['-', '_'])
            .find_map(|segment| Self::parse(segment).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `text` contains this version as a whole token, i.e.
    /// not as part of a longer number (`0.8` is not in `0.81` or `10.8`).
    pub fn appears_in(&self, text: &str) -> bool {
        let needle = self.0.as_str();
        text.match_indices(needle).any(|(start, _)| {
            let before = text[..start].chars().next_back();
            let after = text[start + needle.len()..].chars().next();
            !before.is_some_and(|c| c.is_ascii_digit())
                && !after.is_some_and(|c| c.is_ascii_digit())
        })
    }

    fn tokens(&self) -> Vec<Token<'_>> {
        let mut tokens = Vec::new();
        let s = self.0.as_str();
        let mut chars = s.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if c.is_ascii_digit() {
                let mut end = start + 1;
                while let Some(&(i, d)) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                // Components too large for u64 saturate; good enough for ordering.
                tokens.push(Token::Num(s[start..end].parse().unwrap_or(u64::MAX)));
            } else if c.is_ascii_alphabetic() {
                let mut end = start + 1;
                while let Some(&(i, a)) = chars.peek() {
                    if !a.is_ascii_alphabetic() {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                tokens.push(Token::Alpha(&s[start..end]));
            }
        }
        tokens
    }
}

fn strip_archive_extension(file: &str) -> &str {
    ARCHIVE_EXTENSIONS
        .iter()
        .find_map(|ext| file.strip_suffix(ext))
        .unwrap_or(file)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.tokens();
        let b = other.tokens();
        let len = a.len().max(b.len());
        for i in 0..len {
            let x = a.get(i).unwrap_or(&Token::Num(0));
            let y = b.get(i).unwrap_or(&Token::Num(0));
            let ord = match (x, y) {
                (Token::Num(m), Token::Num(n)) => m.cmp(n),
                (Token::Alpha(m), Token::Alpha(n)) => m.cmp(n),
                // Pre-release markers sort below any number.
                (Token::Num(_), Token::Alpha(_)) => Ordering::Greater,
                (Token::Alpha(_), Token::Num(_)) => Ordering::Less,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.0
    }
}
