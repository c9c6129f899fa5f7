//! On-disk layout of an install root.
//!
//! ```text
//! <root>/
//!   Cellar/<name>/<version>/      one keg per installed version
//!     INSTALL_RECEIPT.json
//!   build/<name>-<version>/       unpacked sources while building
//!   locks/<name>.lock             per-formula install lock
//! ```

use std::path::{Path, PathBuf};

use keg_core::validation::is_valid_name;
use keg_core::version::Version;

use crate::receipt::{InstallReceipt, RECEIPT_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cellar {
    root: PathBuf,
}

impl Cellar {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.root.join("Cellar")
    }

    /// The keg directory (install prefix) for one version.
    pub fn keg_path(&self, name: &str, version: &str) -> PathBuf {
        self.cellar_dir().join(name).join(version)
    }

    pub fn build_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join("build").join(format!("{name}-{version}"))
    }

    /// Path of the per-formula lock. Callers check `name` with
    /// [`is_valid_name`] first.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.root.join("locks").join(format!("{name}.lock"))
    }

    /// The receipt of `name` at `version`, if that keg is installed.
    pub fn receipt(&self, name: &str, version: &str) -> Option<InstallReceipt> {
        if !is_valid_name(name) || !is_plain_component(version) {
            return None;
        }
        read_receipt(&self.keg_path(name, version))
    }

    /// Every installed version of `name`, oldest first.
    pub fn versions(&self, name: &str) -> Vec<InstallReceipt> {
        if !is_valid_name(name) {
            return Vec::new();
        }
        let mut receipts: Vec<InstallReceipt> = subdirs(&self.cellar_dir().join(name))
            .iter()
            .filter_map(|dir| read_receipt(dir))
            .collect();
        receipts.sort_by(|a, b| compare_versions(&a.version, &b.version));
        receipts
    }

    /// The newest installed version of `name`.
    pub fn latest(&self, name: &str) -> Option<InstallReceipt> {
        self.versions(name).pop()
    }

    /// All installed kegs, sorted by name then version.
    pub fn installed(&self) -> Vec<InstallReceipt> {
        let mut names: Vec<String> = subdirs(&self.cellar_dir())
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.iter().flat_map(|name| self.versions(name)).collect()
    }
}

/// A version string that names exactly one directory under the formula.
fn is_plain_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

fn read_receipt(keg: &Path) -> Option<InstallReceipt> {
    if !keg.join(RECEIPT_FILE).is_file() {
        return None;
    }
    match InstallReceipt::read(keg) {
        Ok(receipt) => Some(receipt),
        Err(err) => {
            tracing::warn!(keg = %keg.display(), error = %err, "unreadable install receipt");
            None
        }
    }
}

fn subdirs(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default()
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn install_fake(cellar: &Cellar, name: &str, version: &str) {
        let prefix = cellar.keg_path(name, version);
        std::fs::create_dir_all(&prefix).unwrap();
        InstallReceipt {
            name: name.into(),
            version: version.into(),
            source_url: format!("https://example.org/{name}-{version}.tar.gz"),
            checksum: "sha256:00".into(),
            runtime_dependencies: vec![],
            formula_path: String::new(),
            installed_at: Utc::now(),
            installed_with: "0.1.0".into(),
            prefix,
        }
        .write()
        .unwrap();
    }

    #[test]
    fn layout() {
        let cellar = Cellar::new("/opt/keg");
        assert_eq!(
            cellar.keg_path("mattext", "0.8"),
            PathBuf::from("/opt/keg/Cellar/mattext/0.8")
        );
        assert_eq!(
            cellar.build_dir("mattext", "0.8"),
            PathBuf::from("/opt/keg/build/mattext-0.8")
        );
        assert_eq!(
            cellar.lock_path("mattext"),
            PathBuf::from("/opt/keg/locks/mattext.lock")
        );
    }

    #[test]
    fn installed_requires_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let cellar = Cellar::new(dir.path());
        install_fake(&cellar, "mattext", "0.10");
        install_fake(&cellar, "mattext", "0.8");
        install_fake(&cellar, "libev", "4.33");
        // A keg directory without a receipt is a failed install
        std::fs::create_dir_all(cellar.keg_path("mattext", "0.9")).unwrap();

        assert!(cellar.receipt("mattext", "0.9").is_none());
        let versions: Vec<String> = cellar
            .versions("mattext")
            .into_iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec!["0.8", "0.10"]);
        assert_eq!(cellar.latest("mattext").unwrap().version, "0.10");

        let all: Vec<(String, String)> = cellar
            .installed()
            .into_iter()
            .map(|r| (r.name, r.version))
            .collect();
        assert_eq!(
            all,
            vec![
                ("libev".to_string(), "4.33".to_string()),
                ("mattext".to_string(), "0.8".to_string()),
                ("mattext".to_string(), "0.10".to_string()),
            ]
        );
    }

    #[test]
    fn lookups_refuse_names_that_leave_the_formula_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cellar = Cellar::new(dir.path());
        install_fake(&cellar, "mattext", "0.8");

        assert!(cellar.versions("../Cellar/mattext").is_empty());
        assert!(cellar.versions("..").is_empty());
        assert!(cellar.receipt("mattext", "../mattext/0.8").is_none());
        assert!(cellar.receipt("..", "mattext").is_none());
        assert!(cellar.receipt("mattext", "0.8").is_some());
    }

    #[test]
    fn empty_root_has_nothing_installed() {
        let dir = tempfile::tempdir().unwrap();
        let cellar = Cellar::new(dir.path().join("missing"));
        assert!(cellar.installed().is_empty());
        assert!(cellar.latest("mattext").is_none());
    }
}
