//! Fetching formula sources.
//!
//! - [`fetcher`]: the [`Fetcher`] trait with HTTP(S) and `file://` backends
//! - [`cache`]: the download cache, keyed by formula name, version and file name
//! - [`extract`]: unpacking tarballs into a build directory

pub mod cache;
pub mod error;
pub mod extract;
pub mod fetcher;

pub use cache::{Download, DownloadCache};
pub use error::FetchError;
pub use extract::extract_archive;
pub use fetcher::{FileFetcher, Fetcher, HttpFetcher, SchemeFetcher};
