//! The download cache.
//!
//! Archives are stored flat as `<name>--<version>--<file name>`. A download
//! is written to a `.part` file first and renamed into place once complete,
//! so a cache entry is never a truncated archive.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use keg_core::checksum::Checksum;
use keg_core::formula::Formula;
use url::Url;

use crate::error::FetchError;
use crate::fetcher::Fetcher;

/// Outcome of [`DownloadCache::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    /// `true` if the cached copy was used without downloading.
    pub cached: bool,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadCache {
    dir: PathBuf,
}

impl DownloadCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache location for the archive of `formula`.
    pub fn path_for(&self, formula: &Formula) -> PathBuf {
        self.dir.join(format!(
            "{}--{}--{}",
            formula.name,
            formula.version_label(),
            formula.source.file_name()
        ))
    }

    /// Returns the archive for `formula`, downloading it unless a cached
    /// copy matches `expected`.
    ///
    /// Without an expected checksum the cache is bypassed. The digest of a
    /// fresh download is not checked here.
    pub fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        formula: &Formula,
        expected: Option<&Checksum>,
    ) -> Result<Download, FetchError> {
        let url = Url::parse(&formula.source.url).map_err(|e| FetchError::InvalidUrl {
            url: formula.source.url.clone(),
            reason: e.to_string(),
        })?;
        let path = self.path_for(formula);

        if let Some(expected) = expected {
            if path.is_file() {
                match expected.verify_file(&path) {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), "using cached download");
                        let bytes = std::fs::metadata(&path)
                            .map_err(FetchError::io(&path))?
                            .len();
                        return Ok(Download {
                            path,
                            cached: true,
                            bytes,
                        });
                    }
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "stale cache entry");
                    }
                }
            }
        }

        std::fs::create_dir_all(&self.dir).map_err(FetchError::io(&self.dir))?;
        let part = path.with_file_name(format!(
            "{}.part",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        let bytes = match download_to(fetcher, &url, &part) {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = std::fs::remove_file(&part);
                return Err(err);
            }
        };
        std::fs::rename(&part, &path).map_err(FetchError::io(&path))?;
        tracing::info!(%url, bytes, path = %path.display(), "downloaded");
        Ok(Download {
            path,
            cached: false,
            bytes,
        })
    }

    /// Removes the cached archive of `formula`, if any.
    pub fn evict(&self, formula: &Formula) -> Result<bool, FetchError> {
        let path = self.path_for(formula);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(FetchError::io(path)(err)),
        }
    }
}

fn download_to(fetcher: &dyn Fetcher, url: &Url, part: &Path) -> Result<u64, FetchError> {
    let file = File::create(part).map_err(FetchError::io(part))?;
    let mut writer = BufWriter::new(file);
    let bytes = fetcher.fetch(url, &mut writer)?;
    writer.flush().map_err(FetchError::io(part))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FileFetcher;
    use keg_core::checksum::HashAlgorithm;
    use keg_core::formula::Source;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::io::Write as _;

    /// Counts calls and serves fixed bytes.
    struct CountingFetcher {
        body: Vec<u8>,
        calls: Cell<usize>,
    }

    impl Fetcher for CountingFetcher {
        fn fetch(&self, _url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError> {
            self.calls.set(self.calls.get() + 1);
            dest.write_all(&self.body).unwrap();
            Ok(self.body.len() as u64)
        }
    }

    struct FailingFetcher;

    impl Fetcher for FailingFetcher {
        fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError> {
            dest.write_all(b"partial").unwrap();
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn formula(url: &str) -> Formula {
        Formula {
            name: "mattext".into(),
            version: None,
            homepage: String::new(),
            desc: String::new(),
            source: Source {
                url: url.into(),
                sha256: None,
                sha1: None,
            },
            dependencies: vec![],
            build: vec![],
            install: vec![],
            test: vec![],
            origin: String::new(),
        }
    }

    #[test]
    fn cache_path_layout() {
        let cache = DownloadCache::new("/var/cache/keg");
        let f = formula("https://github.com/dhurum/mattext/archive/v0.8.tar.gz");
        assert_eq!(
            cache.path_for(&f),
            PathBuf::from("/var/cache/keg/mattext--0.8--v0.8.tar.gz")
        );
    }

    #[test]
    fn verified_cache_entry_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path());
        let f = formula("https://github.com/dhurum/mattext/archive/v0.8.tar.gz");
        let fetcher = CountingFetcher {
            body: b"tarball".to_vec(),
            calls: Cell::new(0),
        };
        let sum = Checksum::compute(HashAlgorithm::Sha256, &b"tarball"[..]).unwrap();

        let first = cache.fetch(&fetcher, &f, Some(&sum)).unwrap();
        assert!(!first.cached);
        assert_eq!(first.bytes, 7);
        let second = cache.fetch(&fetcher, &f, Some(&sum)).unwrap();
        assert!(second.cached);
        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn corrupt_cache_entry_is_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path());
        let f = formula("https://github.com/dhurum/mattext/archive/v0.8.tar.gz");
        std::fs::File::create(cache.path_for(&f))
            .unwrap()
            .write_all(b"truncated")
            .unwrap();
        let fetcher = CountingFetcher {
            body: b"tarball".to_vec(),
            calls: Cell::new(0),
        };
        let sum = Checksum::compute(HashAlgorithm::Sha256, &b"tarball"[..]).unwrap();

        let download = cache.fetch(&fetcher, &f, Some(&sum)).unwrap();
        assert!(!download.cached);
        assert_eq!(std::fs::read(&download.path).unwrap(), b"tarball");
    }

    #[test]
    fn failed_download_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(dir.path());
        let f = formula("https://github.com/dhurum/mattext/archive/v0.8.tar.gz");
        let err = cache.fetch(&FailingFetcher, &f, None).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn file_url_and_evict() {
        let src = tempfile::tempdir().unwrap();
        let archive = src.path().join("mattext-0.8.tar.gz");
        std::fs::write(&archive, b"bytes").unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = DownloadCache::new(cache_dir.path().join("nested"));
        let f = formula(Url::from_file_path(&archive).unwrap().as_str());

        let download = cache.fetch(&FileFetcher, &f, None).unwrap();
        assert!(download.path.ends_with("mattext--0.8--mattext-0.8.tar.gz"));
        assert!(cache.evict(&f).unwrap());
        assert!(!cache.evict(&f).unwrap());
    }

    #[test]
    fn invalid_url_rejected() {
        let cache = DownloadCache::new("/unused");
        let err = cache
            .fetch(&FileFetcher, &formula("not a url"), None)
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
