//! `INSTALL_RECEIPT.json`: the marker that a keg is fully installed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use keg_core::formula::{DependencyStage, Formula};
use serde::{Deserialize, Serialize};

/// File name of the receipt inside a keg.
pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

/// What was installed, from where, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub source_url: String,
    /// `algorithm:hex` of the verified archive.
    pub checksum: String,
    /// Runtime dependencies at install time.
    #[serde(default)]
    pub runtime_dependencies: Vec<String>,
    /// Descriptor the keg was built from.
    #[serde(default)]
    pub formula_path: String,
    pub installed_at: DateTime<Utc>,
    /// Version of keg that performed the install.
    pub installed_with: String,
    /// The keg directory; derived from the receipt's location.
    #[serde(skip)]
    pub prefix: PathBuf,
}

impl InstallReceipt {
    pub fn new(formula: &Formula, version: &str, checksum: &str, prefix: &Path) -> Self {
        Self {
            name: formula.name.clone(),
            version: version.to_string(),
            source_url: formula.source.url.clone(),
            checksum: checksum.to_string(),
            runtime_dependencies: formula
                .dependencies_for(&[DependencyStage::Runtime])
                .map(|d| d.name.clone())
                .collect(),
            formula_path: formula.origin.clone(),
            installed_at: Utc::now(),
            installed_with: env!("CARGO_PKG_VERSION").to_string(),
            prefix: prefix.to_path_buf(),
        }
    }

    /// Reads the receipt of the keg at `prefix`.
    pub fn read(prefix: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(prefix.join(RECEIPT_FILE))?;
        let mut receipt: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        receipt.prefix = prefix.to_path_buf();
        Ok(receipt)
    }

    /// Writes the receipt into `self.prefix`.
    pub fn write(&self) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(self.prefix.join(RECEIPT_FILE), json + "\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keg_core::formula::{Dependency, Source};
    use pretty_assertions::assert_eq;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let formula = Formula {
            name: "mattext".into(),
            version: None,
            homepage: String::new(),
            desc: String::new(),
            source: Source {
                url: "https://github.com/dhurum/mattext/archive/v0.8.tar.gz".into(),
                sha256: None,
                sha1: None,
            },
            dependencies: vec![Dependency::build("cmake"), Dependency::runtime("libev")],
            build: vec![],
            install: vec![],
            test: vec![],
            origin: "/formulae/mattext.rb".into(),
        };
        let receipt = InstallReceipt::new(&formula, "0.8", "sha256:abcd", dir.path());
        assert_eq!(receipt.runtime_dependencies, vec!["libev"]);
        receipt.write().unwrap();

        let read = InstallReceipt::read(dir.path()).unwrap();
        assert_eq!(read, receipt);
    }

    #[test]
    fn garbage_receipt_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECEIPT_FILE), "{").unwrap();
        let err = InstallReceipt::read(dir.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
