//! Artifact coordinates and their repository paths.

use std::fmt;

use crate::error::{RepoError, Result};

/// Coordinate group used when none is configured.
pub const DEFAULT_GROUP: &str = "org.terasology.modules";

/// Extension of module artifacts.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Identifies one artifact: `group:artifact:extension:version`.
///
/// `version` may be an exact version or a range expression; resolution
/// decides which it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub extension: String,
    pub version: String,
}

impl Coordinate {
    /// Build a coordinate, rejecting empty components.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        extension: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        let coordinate = Coordinate {
            group: group.into(),
            artifact: artifact.into(),
            extension: extension.into(),
            version: version.into(),
        };
        if coordinate.artifact.trim().is_empty() || coordinate.group.trim().is_empty() {
            return Err(RepoError::InvalidCoordinate {
                coordinate: coordinate.to_string(),
                detail: "group and artifact id must not be empty".to_string(),
            });
        }
        if coordinate.version.trim().is_empty() {
            return Err(RepoError::InvalidVersion {
                version: coordinate.version.clone(),
                detail: "version is empty".to_string(),
            });
        }
        Ok(coordinate)
    }

    /// Same artifact and version with another extension.
    pub fn with_extension(&self, extension: &str) -> Self {
        Coordinate {
            extension: extension.to_string(),
            ..self.clone()
        }
    }

    /// Same artifact with another version.
    pub fn with_version(&self, version: &str) -> Self {
        Coordinate {
            version: version.to_string(),
            ..self.clone()
        }
    }

    /// Whether the version is a snapshot (plain or timestamped).
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("-SNAPSHOT") || split_timestamped(&self.version).is_some()
    }

    /// The `-SNAPSHOT` form of a timestamped version, or the version itself.
    pub fn base_version(&self) -> String {
        match split_timestamped(&self.version) {
            Some(base) => format!("{base}-SNAPSHOT"),
            None => self.version.clone(),
        }
    }

    /// `group/with/slashes/artifact/`.
    pub fn artifact_dir(&self) -> String {
        format!("{}/{}/", self.group.replace('.', "/"), self.artifact)
    }

    /// `group/with/slashes/artifact/baseVersion/`.
    pub fn version_dir(&self) -> String {
        format!("{}{}/", self.artifact_dir(), self.base_version())
    }

    /// File name for this artifact published as `file_version`.
    pub fn file_name(&self, file_version: &str) -> String {
        format!("{}-{}.{}", self.artifact, file_version, self.extension)
    }

    /// Repository-relative path of the artifact file.
    pub fn path(&self, file_version: &str) -> String {
        format!("{}{}", self.version_dir(), self.file_name(file_version))
    }
}

/// Splits `1.0-20140101.120000-3` into its base `1.0`.
fn split_timestamped(version: &str) -> Option<&str> {
    let mut parts = version.rsplitn(3, '-');
    let build = parts.next()?;
    let timestamp = parts.next()?;
    let base = parts.next()?;

    let (date, time) = timestamp.split_once('.')?;
    let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
    let is_build = !build.is_empty() && build.bytes().all(|b| b.is_ascii_digit());

    (digits(date, 8) && digits(time, 6) && is_build).then_some(base)
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.group, self.artifact, self.extension, self.version
        )
    }
}
