//! Transport backends for source URLs.

use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use url::Url;

use crate::error::FetchError;

/// Something that can stream the resource behind a URL.
pub trait Fetcher {
    /// Writes the resource at `url` into `dest`, returning the byte count.
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError>;
}

/// HTTP(S) downloads through a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: user_agent.into(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError> {
        tracing::debug!(%url, "GET");
        let mut response = self
            .agent
            .get(url.as_str())
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .map_err(|err| match err {
                ureq::Error::StatusCode(status) => FetchError::Status {
                    url: url.to_string(),
                    status,
                },
                other => FetchError::Unreachable {
                    url: url.to_string(),
                    reason: other.to_string(),
                },
            })?;
        let mut reader = response.body_mut().as_reader();
        io::copy(&mut reader, dest).map_err(|err| FetchError::Unreachable {
            url: url.to_string(),
            reason: format!("transfer interrupted: {err}"),
        })
    }
}

/// Local files addressed as `file:///path`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError> {
        let path = url.to_file_path().map_err(|()| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: "not a local file path".to_string(),
        })?;
        let mut file = File::open(&path).map_err(|err| FetchError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        io::copy(&mut file, dest).map_err(FetchError::io(path))
    }
}

/// Dispatches to the backend for the URL's scheme.
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SchemeFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            file: FileFetcher,
        }
    }
}

impl Fetcher for SchemeFetcher {
    fn fetch(&self, url: &Url, dest: &mut dyn Write) -> Result<u64, FetchError> {
        match url.scheme() {
            "http" | "https" => self.http.fetch(url, dest),
            "file" => self.file.fetch(url, dest),
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}
