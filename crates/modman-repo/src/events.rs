//! Transfer and repository event sinks.
//!
//! A [`ResolutionSession`](crate::session::ResolutionSession) reports every
//! download to its [`TransferListener`] and every resolution step to its
//! [`RepositoryListener`]. The logging implementations write both streams
//! to `tracing`.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::coordinate::Coordinate;

/// A resource being transferred.
#[derive(Debug, Clone)]
pub struct TransferResource {
    /// Base URL of the repository.
    pub repository_url: String,
    /// Repository-relative resource path.
    pub resource_name: String,
    pub started: Instant,
}

impl TransferResource {
    pub fn new(repository_url: impl Into<String>, resource_name: impl Into<String>) -> Self {
        TransferResource {
            repository_url: repository_url.into(),
            resource_name: resource_name.into(),
            started: Instant::now(),
        }
    }

    /// Full URL of the resource.
    pub fn location(&self) -> String {
        format!("{}{}", self.repository_url, self.resource_name)
    }
}

impl fmt::Display for TransferResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <> {}", self.repository_url, self.resource_name)
    }
}

/// Why a transfer did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    /// The repository does not have the resource.
    NotFound,
    /// The transfer itself failed.
    Error(String),
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailure::NotFound => f.write_str("not found"),
            TransferFailure::Error(detail) => f.write_str(detail),
        }
    }
}

/// Receives download lifecycle notifications. All methods default to no-ops.
pub trait TransferListener: Send + Sync {
    fn transfer_initiated(&self, _resource: &TransferResource) {}
    fn transfer_started(&self, _resource: &TransferResource) {}
    fn transfer_progressed(
        &self,
        _resource: &TransferResource,
        _transferred: u64,
        _total: Option<u64>,
    ) {
    }
    fn transfer_succeeded(&self, _resource: &TransferResource, _transferred: u64) {}
    fn transfer_failed(&self, _resource: &TransferResource, _failure: &TransferFailure) {}
    fn transfer_corrupted(&self, _resource: &TransferResource, _detail: &str) {}
}

/// One step of artifact or metadata resolution.
#[derive(Debug, Clone, Copy)]
pub enum RepositoryEvent<'a> {
    ArtifactResolving {
        artifact: &'a Coordinate,
    },
    ArtifactDownloading {
        artifact: &'a Coordinate,
        repository: &'a str,
    },
    ArtifactDownloaded {
        artifact: &'a Coordinate,
        repository: &'a str,
    },
    ArtifactResolved {
        artifact: &'a Coordinate,
        repository: &'a str,
        file: &'a Path,
    },
    MetadataResolving {
        metadata: &'a str,
        repository: &'a str,
    },
    MetadataDownloading {
        metadata: &'a str,
        repository: &'a str,
    },
    MetadataDownloaded {
        metadata: &'a str,
        repository: &'a str,
    },
    MetadataResolved {
        metadata: &'a str,
        repository: &'a str,
    },
    MetadataInvalid {
        metadata: &'a str,
        detail: &'a str,
    },
    DescriptorMissing {
        artifact: &'a Coordinate,
    },
    DescriptorInvalid {
        artifact: &'a Coordinate,
        detail: &'a str,
    },
}

/// Receives [`RepositoryEvent`]s.
pub trait RepositoryListener: Send + Sync {
    fn on_event(&self, event: &RepositoryEvent<'_>);
}

/// Listener that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TransferListener for NoopListener {}

impl RepositoryListener for NoopListener {
    fn on_event(&self, _event: &RepositoryEvent<'_>) {}
}

/// Kilobytes, rounded half-up.
pub fn to_kb(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

/// Progress text such as `3/12 KB ` or `100/200 B `.
pub fn progress_status(complete: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total >= 1024 => format!("{}/{} KB ", to_kb(complete), to_kb(total)),
        Some(total) => format!("{complete}/{total} B "),
        None if complete >= 1024 => format!("{} KB ", to_kb(complete)),
        None => format!("{complete} B "),
    }
}

/// Size text such as `12 KB` or `300 B`.
pub fn size_text(bytes: u64) -> String {
    if bytes >= 1024 {
        format!("{} KB", to_kb(bytes))
    } else {
        format!("{bytes} B")
    }
}

/// Logs transfers through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTransferListener;

impl TransferListener for LoggingTransferListener {
    fn transfer_initiated(&self, resource: &TransferResource) {
        tracing::debug!("Downloading: {}", resource.location());
    }

    fn transfer_started(&self, resource: &TransferResource) {
        tracing::debug!("Transfer Started: {resource}");
    }

    fn transfer_progressed(
        &self,
        _resource: &TransferResource,
        transferred: u64,
        total: Option<u64>,
    ) {
        tracing::debug!("Transfer Progress: {}", progress_status(transferred, total));
    }

    fn transfer_succeeded(&self, resource: &TransferResource, transferred: u64) {
        tracing::info!("Transfer complete: {resource}");

        let millis = resource.started.elapsed().as_millis();
        let throughput = if millis > 0 {
            let kb_per_sec = (transferred as f64 / 1024.0) / (millis as f64 / 1000.0);
            format!(" at {kb_per_sec:.1} KB/sec")
        } else {
            String::new()
        };
        tracing::debug!(
            "Downloaded: {} ({}{})",
            resource.location(),
            size_text(transferred),
            throughput
        );
    }

    fn transfer_failed(&self, resource: &TransferResource, failure: &TransferFailure) {
        tracing::info!("Transfer complete: {resource}");
        if let TransferFailure::Error(detail) = failure {
            tracing::error!(url = %resource.location(), error = %detail, "Transfer failed");
        }
    }

    fn transfer_corrupted(&self, resource: &TransferResource, detail: &str) {
        tracing::error!(url = %resource.location(), error = %detail, "Transfer corrupted");
    }
}

/// Logs repository events at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRepositoryListener;

impl RepositoryListener for LoggingRepositoryListener {
    fn on_event(&self, event: &RepositoryEvent<'_>) {
        match *event {
            RepositoryEvent::ArtifactResolving { artifact } => {
                tracing::debug!("Resolving artifact {artifact}");
            }
            RepositoryEvent::ArtifactDownloading { artifact, repository } => {
                tracing::debug!("Downloading artifact {artifact} from {repository}");
            }
            RepositoryEvent::ArtifactDownloaded { artifact, repository } => {
                tracing::debug!("Downloaded artifact {artifact} from {repository}");
            }
            RepositoryEvent::ArtifactResolved {
                artifact,
                repository,
                file,
            } => {
                tracing::debug!(
                    "Resolved artifact {artifact} from {repository} ({})",
                    file.display()
                );
            }
            RepositoryEvent::MetadataResolving {
                metadata,
                repository,
            } => {
                tracing::debug!("Resolving metadata {metadata} from {repository}");
            }
            RepositoryEvent::MetadataDownloading {
                metadata,
                repository,
            } => {
                tracing::debug!("Downloading metadata {metadata} from {repository}");
            }
            RepositoryEvent::MetadataDownloaded {
                metadata,
                repository,
            } => {
                tracing::debug!("Downloaded metadata {metadata} from {repository}");
            }
            RepositoryEvent::MetadataResolved {
                metadata,
                repository,
            } => {
                tracing::debug!("Resolved metadata {metadata} from {repository}");
            }
            RepositoryEvent::MetadataInvalid { metadata, detail } => {
                tracing::debug!("Invalid metadata {metadata}: {detail}");
            }
            RepositoryEvent::DescriptorMissing { artifact } => {
                tracing::debug!("Missing artifact descriptor for {artifact}");
            }
            RepositoryEvent::DescriptorInvalid { artifact, detail } => {
                tracing::debug!("Invalid artifact descriptor for {artifact}: {detail}");
            }
        }
    }
}
