//! Fetching flat index documents.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use crate::error::{IndexError, Result};

/// Retrieves the raw bytes of an index document.
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document at `location`.
    fn fetch(&self, location: &str) -> Result<Vec<u8>>;
}

/// [`DocumentFetcher`] for `http(s)://` and `file://` URLs and plain paths.
#[derive(Clone)]
pub struct HttpDocumentFetcher {
    client: Client,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpDocumentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDocumentFetcher")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpDocumentFetcher {
    /// Create a fetcher without a request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Create a fetcher with an optional request timeout.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modman/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IndexError::Fetch {
                location: "<client>".to_string(),
                detail: format!("creating HTTP client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn fetch_http(&self, location: &str) -> Result<Vec<u8>> {
        let fail = |detail: String| IndexError::Fetch {
            location: location.to_string(),
            detail,
        };

        let response = self.client.get(location).send().map_err(|e| {
            if e.is_timeout() {
                fail(format!("timed out after {:?}", self.timeout.unwrap_or_default()))
            } else {
                fail(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl DocumentFetcher for HttpDocumentFetcher {
    fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return self.fetch_http(location);
        }

        let path = if location.starts_with("file:") {
            Url::parse(location)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| IndexError::Fetch {
                    location: location.to_string(),
                    detail: "not a valid file URL".to_string(),
                })?
        } else {
            PathBuf::from(location)
        };

        std::fs::read(&path).map_err(|e| IndexError::Fetch {
            location: location.to_string(),
            detail: e.to_string(),
        })
    }
}
