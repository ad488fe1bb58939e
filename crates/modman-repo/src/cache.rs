//! Local artifact cache.
//!
//! Mirrors the Maven local-repository layout under one root:
//!
//! ```text
//! <root>/
//!   org/terasology/modules/
//!     Sample/
//!       maven-metadata-<repo>.xml      - version list per repository
//!       0.1.0-SNAPSHOT/
//!         Sample-0.1.0-SNAPSHOT.jar
//!         Sample-0.1.0-SNAPSHOT.pom
//!         Sample-0.1.0-20140601.101010-1.jar
//!         maven-metadata-<repo>.xml    - snapshot build info
//!         integrity.json               - source repo + SHA-256 per file
//! ```
//!
//! A request for `-SNAPSHOT` is stored under the `-SNAPSHOT` name whatever
//! build it resolved to. A request for one timestamped build is stored
//! under that build's own name. All writes go to a temporary file first and
//! are renamed into place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::coordinate::Coordinate;
use crate::error::{RepoError, Result};

const INTEGRITY_FILE: &str = "integrity.json";

/// SHA-256 of `data` as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Where a cached file came from and what it hashed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub repository: String,
    pub sha256: String,
}

impl IntegrityRecord {
    fn matches(&self, data: &[u8]) -> bool {
        sha256_hex(data) == self.sha256
    }
}

type IntegrityFile = BTreeMap<String, IntegrityRecord>;

/// A cached artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub path: PathBuf,
    /// Repository the file was downloaded from.
    pub repository: String,
    pub modified: SystemTime,
}

/// Outcome of looking up a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(CachedArtifact),
    Miss,
    /// The file was present but failed its integrity check and was removed.
    Corrupted(PathBuf),
}

/// Filesystem cache keyed by artifact coordinates.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalCache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of an artifact file, inside its base version directory.
    pub fn artifact_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.root
            .join(coordinate.version_dir())
            .join(coordinate.file_name(&coordinate.version))
    }

    /// Local path of per-repository metadata.
    ///
    /// With `version_level` the snapshot metadata of the coordinate's base
    /// version is addressed, otherwise the artifact's version list.
    pub fn metadata_path(
        &self,
        coordinate: &Coordinate,
        version_level: bool,
        repository: &str,
    ) -> PathBuf {
        let dir = if version_level {
            coordinate.version_dir()
        } else {
            coordinate.artifact_dir()
        };
        self.root
            .join(dir)
            .join(format!("maven-metadata-{repository}.xml"))
    }

    /// Last modification time of a cached file, if it exists.
    pub fn modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .and_then(|m| m.modified().ok())
    }

    /// Read a cached file; `None` if absent.
    pub fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RepoError::cache(path, format!("reading: {e}"))),
        }
    }

    /// Atomically write a file into the cache.
    pub fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| RepoError::cache(path, "path has no parent directory"))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| RepoError::cache(dir, format!("creating cache dir: {e}")))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{name}.{}.part", uuid::Uuid::new_v4()));
        std::fs::write(&tmp, data)
            .map_err(|e| RepoError::cache(&tmp, format!("writing: {e}")))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(RepoError::cache(path, format!("moving into place: {e}")));
        }
        Ok(())
    }

    /// Store a downloaded artifact and record its integrity.
    pub fn store_artifact(
        &self,
        coordinate: &Coordinate,
        repository: &str,
        data: &[u8],
    ) -> Result<PathBuf> {
        let path = self.artifact_path(coordinate);
        self.write(&path, data)?;

        let dir = self.root.join(coordinate.version_dir());
        let mut records = self.read_integrity(&dir)?;
        records.insert(
            file_key(&path),
            IntegrityRecord {
                repository: repository.to_string(),
                sha256: sha256_hex(data),
            },
        );
        self.write(&dir.join(INTEGRITY_FILE), &serde_json::to_vec_pretty(&records)?)?;
        Ok(path)
    }

    /// Look up a cached artifact, verifying it against its integrity record.
    ///
    /// Files without a record, or whose content no longer matches, are
    /// removed so the caller downloads them again.
    pub fn lookup_artifact(&self, coordinate: &Coordinate) -> Result<CacheLookup> {
        let path = self.artifact_path(coordinate);
        let Some(data) = self.read(&path)? else {
            return Ok(CacheLookup::Miss);
        };

        let dir = self.root.join(coordinate.version_dir());
        let records = self.read_integrity(&dir)?;
        match records.get(&file_key(&path)) {
            Some(record) if record.matches(&data) => Ok(CacheLookup::Hit(CachedArtifact {
                modified: self.modified(&path).unwrap_or(SystemTime::UNIX_EPOCH),
                repository: record.repository.clone(),
                path,
            })),
            _ => {
                std::fs::remove_file(&path)
                    .map_err(|e| RepoError::cache(&path, format!("removing corrupt file: {e}")))?;
                Ok(CacheLookup::Corrupted(path))
            }
        }
    }

    /// Remove a cached file if present.
    pub fn remove(&self, path: &Path) -> Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RepoError::cache(path, format!("removing: {e}"))),
        }
    }

    fn read_integrity(&self, dir: &Path) -> Result<IntegrityFile> {
        let path = dir.join(INTEGRITY_FILE);
        match self.read(&path)? {
            None => Ok(IntegrityFile::new()),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => Ok(records),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Discarding unreadable integrity records"
                    );
                    Ok(IntegrityFile::new())
                }
            },
        }
    }
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::DEFAULT_GROUP;

    fn coord(version: &str) -> Coordinate {
        Coordinate::new(DEFAULT_GROUP, "Sample", "jar", version).unwrap()
    }

    #[test]
    fn store_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let c = coord("0.1.0-SNAPSHOT");

        assert_eq!(cache.lookup_artifact(&c).unwrap(), CacheLookup::Miss);

        let path = cache.store_artifact(&c, "terasology", b"jar bytes").unwrap();
        assert!(path.ends_with(
            "org/terasology/modules/Sample/0.1.0-SNAPSHOT/Sample-0.1.0-SNAPSHOT.jar"
        ));

        match cache.lookup_artifact(&c).unwrap() {
            CacheLookup::Hit(hit) => {
                assert_eq!(hit.path, path);
                assert_eq!(hit.repository, "terasology");
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn timestamped_builds_have_their_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let snapshot = cache.artifact_path(&coord("0.1.0-SNAPSHOT"));
        let first = cache.artifact_path(&coord("0.1.0-20140601.101010-1"));
        let second = cache.artifact_path(&coord("0.1.0-20140601.101010-2"));

        assert!(first.ends_with("Sample/0.1.0-SNAPSHOT/Sample-0.1.0-20140601.101010-1.jar"));
        assert_ne!(first, second);
        assert_ne!(first, snapshot);
        assert_eq!(first.parent(), snapshot.parent());

        cache.store_artifact(&coord("0.1.0-20140601.101010-1"), "a", b"one").unwrap();
        cache.store_artifact(&coord("0.1.0-20140601.101010-2"), "a", b"two").unwrap();
        cache.store_artifact(&coord("0.1.0-SNAPSHOT"), "a", b"two").unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(matches!(
            cache.lookup_artifact(&coord("0.1.0-20140601.101010-1")).unwrap(),
            CacheLookup::Hit(_)
        ));
    }

    #[test]
    fn tampered_artifact_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let c = coord("1.0.0");
        let path = cache.store_artifact(&c, "central", b"original").unwrap();

        std::fs::write(&path, b"tampered").unwrap();
        assert_eq!(
            cache.lookup_artifact(&c).unwrap(),
            CacheLookup::Corrupted(path.clone())
        );
        assert!(!path.exists());
    }

    #[test]
    fn unrecorded_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let c = coord("1.0.0");
        let path = cache.artifact_path(&c);
        cache.write(&path, b"dropped in by hand").unwrap();

        assert!(matches!(
            cache.lookup_artifact(&c).unwrap(),
            CacheLookup::Corrupted(_)
        ));
    }

    #[test]
    fn metadata_paths_are_per_repository() {
        let cache = LocalCache::new("/cache");
        let c = coord("0.1.0-SNAPSHOT");
        assert_eq!(
            cache.metadata_path(&c, false, "central"),
            PathBuf::from("/cache/org/terasology/modules/Sample/maven-metadata-central.xml")
        );
        assert_eq!(
            cache.metadata_path(&c, true, "central"),
            PathBuf::from(
                "/cache/org/terasology/modules/Sample/0.1.0-SNAPSHOT/maven-metadata-central.xml"
            )
        );
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path());
        let path = dir.path().join("a/b/file.xml");
        cache.write(&path, b"one").unwrap();
        cache.write(&path, b"two").unwrap();

        assert_eq!(cache.read(&path).unwrap().as_deref(), Some(&b"two"[..]));
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("a/b")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(cache.remove(&path).unwrap());
        assert!(!cache.remove(&path).unwrap());
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
