//! Archive digests.
//!
//! A [`Checksum`] pairs a [`HashAlgorithm`] with a lowercase hex digest.
//! Older formulae pin their archives with SHA-1, newer ones with SHA-256;
//! both are accepted and verified the same way.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Read buffer used when streaming files through a digest.
const BUF_SIZE: usize = 64 * 1024;

/// Errors produced while parsing or verifying checksums.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("no checksum: set sha256 (or sha1)")]
    Missing,

    #[error("both sha1 and sha256 are set")]
    Conflicting,

    #[error("{algorithm} digest is empty")]
    Empty { algorithm: HashAlgorithm },

    #[error("{algorithm} digest must be {expected} hex characters (got {actual})")]
    InvalidLength {
        algorithm: HashAlgorithm,
        expected: usize,
        actual: usize,
    },

    #[error("digest contains non-hex characters: {0}")]
    InvalidHex(String),

    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: Checksum, actual: Checksum },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// Returns the lowercase name used in formula files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Number of hex characters in a digest of this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(ChecksumError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A validated digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: HashAlgorithm,
    hex: String,
}

impl Checksum {
    /// Builds a checksum, checking length and alphabet. The digest is
    /// stored lowercase.
    pub fn new(algorithm: HashAlgorithm, hex: &str) -> Result<Self, ChecksumError> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err(ChecksumError::Empty { algorithm });
        }
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex(format!("'{bad}' in {hex}")));
        }
        if hex.len() != algorithm.hex_len() {
            return Err(ChecksumError::InvalidLength {
                algorithm,
                expected: algorithm.hex_len(),
                actual: hex.len(),
            });
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Parses the `algorithm:hex` form produced by [`Checksum`]'s `Display`.
    pub fn parse(s: &str) -> Result<Self, ChecksumError> {
        match s.split_once(':') {
            Some((algo, hex)) => Self::new(algo.parse()?, hex),
            None => Err(ChecksumError::UnknownAlgorithm(s.to_string())),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Streams `reader` through the digest for `algorithm`.
    pub fn compute<R: Read>(algorithm: HashAlgorithm, reader: R) -> io::Result<Self> {
        let hex = match algorithm {
            HashAlgorithm::Sha1 => digest_reader::<Sha1, _>(reader)?,
            HashAlgorithm::Sha256 => digest_reader::<Sha256, _>(reader)?,
        };
        Ok(Self { algorithm, hex })
    }

    /// Computes the digest of the file at `path`.
    pub fn compute_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::compute(algorithm, file)
    }

    /// Recomputes the digest of `path` with this checksum's algorithm and
    /// compares it.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::Mismatch`] when the digests differ, or
    /// [`ChecksumError::Io`] if the file cannot be read.
    pub fn verify_file(&self, path: &Path) -> Result<(), ChecksumError> {
        let actual = Self::compute_file(self.algorithm, path)?;
        self.verify(actual)
    }

    /// Compares this checksum against an already computed one.
    pub fn verify(&self, actual: Checksum) -> Result<(), ChecksumError> {
        if actual == *self {
            Ok(())
        } else {
            Err(ChecksumError::Mismatch {
                expected: self.clone(),
                actual,
            })
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Checksum::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const MATTEXT_08: &str = "4998efdf224f8f8c7afe54e3dffe60f547bcc573b50b6d3415d52865ee519ab2";
    const MATTEXT_06: &str = "8b96dd4fa1cb06bc3e0b7aade6f8e3e20910dc7b";

    #[test]
    fn accepts_recorded_digests() {
        let c = Checksum::new(HashAlgorithm::Sha256, MATTEXT_08).unwrap();
        assert_eq!(c.hex(), MATTEXT_08);
        let c = Checksum::new(HashAlgorithm::Sha1, MATTEXT_06).unwrap();
        assert_eq!(c.algorithm(), HashAlgorithm::Sha1);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Checksum::new(HashAlgorithm::Sha256, MATTEXT_06).unwrap_err();
        assert!(matches!(
            err,
            ChecksumError::InvalidLength {
                expected: 64,
                actual: 40,
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_and_non_hex() {
        assert!(matches!(
            Checksum::new(HashAlgorithm::Sha1, "  "),
            Err(ChecksumError::Empty { .. })
        ));
        let bad = "z".repeat(40);
        assert!(matches!(
            Checksum::new(HashAlgorithm::Sha1, &bad),
            Err(ChecksumError::InvalidHex(_))
        ));
    }

    #[test]
    fn uppercase_is_normalized() {
        let c = Checksum::new(HashAlgorithm::Sha256, &MATTEXT_08.to_uppercase()).unwrap();
        assert_eq!(c.hex(), MATTEXT_08);
    }

    #[test]
    fn display_and_parse_agree() {
        let c = Checksum::new(HashAlgorithm::Sha256, MATTEXT_08).unwrap();
        let s = c.to_string();
        assert_eq!(s, format!("sha256:{MATTEXT_08}"));
        assert_eq!(Checksum::parse(&s).unwrap(), c);
        assert!(Checksum::parse(MATTEXT_08).is_err());
    }

    #[test]
    fn computes_known_digests() {
        let c = Checksum::compute(HashAlgorithm::Sha256, &b"abc"[..]).unwrap();
        assert_eq!(
            c.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let c = Checksum::compute(HashAlgorithm::Sha1, &b"abc"[..]).unwrap();
        assert_eq!(c.hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn verify_file_is_repeatable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"archive bytes").unwrap();
        let expected = Checksum::compute_file(HashAlgorithm::Sha256, file.path()).unwrap();
        expected.verify_file(file.path()).unwrap();
        expected.verify_file(file.path()).unwrap();
    }

    #[test]
    fn verify_file_reports_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"tampered").unwrap();
        let expected = Checksum::new(HashAlgorithm::Sha256, MATTEXT_08).unwrap();
        match expected.verify_file(file.path()).unwrap_err() {
            ChecksumError::Mismatch { expected: e, actual } => {
                assert_eq!(e.hex(), MATTEXT_08);
                assert_ne!(actual.hex(), MATTEXT_08);
            }
            other => panic!("expected Mismatch, got: {other:?}"),
        }
    }
}
