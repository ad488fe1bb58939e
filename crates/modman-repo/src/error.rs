//! Repository error types.

use std::fmt;
use std::path::PathBuf;

/// Why one repository could not satisfy a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFailure {
    /// Repository id.
    pub repository: String,
    /// Human-readable reason.
    pub reason: String,
}

impl RepositoryFailure {
    pub(crate) fn new(repository: &str, reason: impl fmt::Display) -> Self {
        RepositoryFailure {
            repository: repository.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RepositoryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.repository, self.reason)
    }
}

fn attempts_summary(attempts: &[RepositoryFailure]) -> String {
    if attempts.is_empty() {
        return "no repositories configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur while resolving against remote repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// A repository URL is not well-formed.
    #[error("invalid repository URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// A version string is not usable.
    #[error("invalid version '{version}': {detail}")]
    InvalidVersion { version: String, detail: String },

    /// An artifact coordinate is incomplete.
    #[error("invalid coordinate '{coordinate}': {detail}")]
    InvalidCoordinate { coordinate: String, detail: String },

    /// An update policy string is not recognised.
    #[error("invalid update policy '{value}': expected always, never, daily or interval:<minutes>")]
    InvalidPolicy { value: String },

    /// A version range expression could not be parsed.
    #[error("invalid version range '{range}': {detail}")]
    InvalidRange { range: String, detail: String },

    /// No repository could answer a version range query.
    #[error("failed to resolve versions of {coordinate}: tried {}", attempts_summary(attempts))]
    VersionRange {
        coordinate: String,
        attempts: Vec<RepositoryFailure>,
    },

    /// No repository provided the requested artifact.
    #[error("could not find artifact {coordinate}: tried {}", attempts_summary(attempts))]
    ArtifactResolution {
        coordinate: String,
        attempts: Vec<RepositoryFailure>,
    },

    /// The artifact descriptor could not be read.
    #[error(
        "failed to read artifact descriptor for {coordinate}: tried {}",
        attempts_summary(attempts)
    )]
    Descriptor {
        coordinate: String,
        attempts: Vec<RepositoryFailure>,
    },

    /// A transfer failed for a reason other than absence.
    #[error("transfer of {url} failed: {detail}")]
    Transfer { url: String, detail: String },

    /// The session is offline and the resource is not cached.
    #[error("cannot access {url} in offline mode")]
    Offline { url: String },

    /// Local cache I/O error.
    #[error("cache error at {path}: {detail}")]
    Cache { path: PathBuf, detail: String },

    /// Document bytes are not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// XML decoding error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub(crate) fn cache(path: impl Into<PathBuf>, detail: impl fmt::Display) -> Self {
        RepoError::Cache {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    /// Per-repository failures carried by a resolution error.
    pub fn attempts(&self) -> &[RepositoryFailure] {
        match self {
            RepoError::VersionRange { attempts, .. }
            | RepoError::ArtifactResolution { attempts, .. }
            | RepoError::Descriptor { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_names_every_repository() {
        let err = RepoError::ArtifactResolution {
            coordinate: "org.example:Sample:jar:1.0".to_string(),
            attempts: vec![
                RepositoryFailure::new("first", "not found"),
                RepositoryFailure::new("second", "HTTP 500"),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("first (not found)"));
        assert!(message.contains("second (HTTP 500)"));
        assert_eq!(err.attempts().len(), 2);
    }

    #[test]
    fn empty_attempts_are_explained() {
        let err = RepoError::VersionRange {
            coordinate: "g:a:jar:[0,)".to_string(),
            attempts: Vec::new(),
        };
        assert!(err.to_string().contains("no repositories configured"));
    }
}
