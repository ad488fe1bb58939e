//! Transports: how resource bytes are fetched from a repository URL.
//!
//! A transport answers `Ok(None)` when the resource does not exist, so
//! absence is never confused with a transfer failure.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};

use crate::error::{RepoError, Result};

/// Progress callback: `(transferred, total)` in bytes.
pub type Progress<'a> = dyn FnMut(u64, Option<u64>) + 'a;

/// Fetches resources by URL.
pub trait Transport: Send + Sync {
    /// Download `url`, reporting progress as bytes arrive.
    ///
    /// Returns `Ok(None)` if the resource does not exist.
    fn get(&self, url: &Url, progress: &mut Progress<'_>) -> Result<Option<Vec<u8>>>;
}

const CHUNK: usize = 16 * 1024;

fn read_all(
    mut reader: impl Read,
    total: Option<u64>,
    progress: &mut Progress<'_>,
) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; CHUNK];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
        progress(body.len() as u64, total);
    }
    Ok(body)
}

/// HTTP(S) transport over `reqwest`'s blocking client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport; `None` means requests never time out.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modman/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::Transfer {
                url: "<client>".to_string(),
                detail: format!("creating HTTP client: {e}"),
            })?;
        Ok(HttpTransport { client, timeout })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url, progress: &mut Progress<'_>) -> Result<Option<Vec<u8>>> {
        let fail = |detail: String| RepoError::Transfer {
            url: url.to_string(),
            detail,
        };

        let response = self.client.get(url.clone()).send().map_err(|e| {
            if e.is_timeout() {
                fail(format!("timed out after {:?}", self.timeout.unwrap_or_default()))
            } else {
                fail(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let total = response.content_length();
        read_all(response, total, progress)
            .map(Some)
            .map_err(|e| fail(e.to_string()))
    }
}

/// Transport for `file://` repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn get(&self, url: &Url, progress: &mut Progress<'_>) -> Result<Option<Vec<u8>>> {
        let path = url.to_file_path().map_err(|()| RepoError::Transfer {
            url: url.to_string(),
            detail: "not a local file URL".to_string(),
        })?;
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RepoError::Transfer {
                    url: url.to_string(),
                    detail: e.to_string(),
                })
            }
        };
        if path.is_dir() {
            return Ok(None);
        }
        let total = file.metadata().ok().map(|m| m.len());
        read_all(file, total, progress)
            .map(Some)
            .map_err(|e| RepoError::Transfer {
                url: url.to_string(),
                detail: e.to_string(),
            })
    }
}

/// Dispatches on the URL scheme to [`HttpTransport`] or [`FileTransport`].
#[derive(Debug, Clone)]
pub struct DefaultTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl DefaultTransport {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        Ok(DefaultTransport {
            http: HttpTransport::new(timeout)?,
            file: FileTransport,
        })
    }
}

impl Transport for DefaultTransport {
    fn get(&self, url: &Url, progress: &mut Progress<'_>) -> Result<Option<Vec<u8>>> {
        match url.scheme() {
            "http" | "https" => self.http.get(url, progress),
            "file" => self.file.get(url, progress),
            other => Err(RepoError::Transfer {
                url: url.to_string(),
                detail: format!("unsupported URL scheme '{other}'"),
            }),
        }
    }
}
