//! The resolution protocol.
//!
//! One [`ResolveRequest`] names a coordinate, the repositories to try and
//! what to produce: the versions matching a constraint, a downloaded
//! artifact, or the artifact's descriptor. Repositories are tried in
//! order and the first one that has the resource wins; version queries
//! instead take the union of every repository's answer.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use reqwest::Url;

use crate::cache::CacheLookup;
use crate::coordinate::Coordinate;
use crate::error::{RepoError, RepositoryFailure, Result};
use crate::events::{RepositoryEvent, TransferFailure, TransferResource};
use crate::metadata::{Metadata, METADATA_FILE};
use crate::pom::Pom;
use crate::repository::RemoteRepository;
use crate::session::{Known, ResolutionSession, SessionState};
use crate::transport::Transport;
use crate::version::{Version, VersionConstraint};

/// What a [`ResolveRequest`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    VersionRange,
    Artifact,
    Descriptor,
}

/// One resolution request.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub kind: RequestKind,
    pub coordinate: Coordinate,
    pub repositories: &'a [RemoteRepository],
}

/// Versions matching a constraint.
#[derive(Debug, Clone)]
pub struct VersionRangeResult {
    pub constraint: VersionConstraint,
    /// Ascending, without duplicates.
    pub versions: Vec<Version>,
    /// Repositories that could not be queried. Partial failures do not
    /// fail the request.
    pub failures: Vec<RepositoryFailure>,
}

/// A resolved artifact in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResult {
    pub coordinate: Coordinate,
    pub file: PathBuf,
    /// Repository the file came from.
    pub repository: String,
}

/// A resolved artifact descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorResult {
    pub coordinate: Coordinate,
    pub repository: String,
    pub pom: Pom,
}

impl DescriptorResult {
    /// Artifact ids of the direct dependencies, in declared order.
    pub fn dependency_ids(&self) -> Vec<String> {
        self.pom
            .dependencies
            .iter()
            .map(|d| d.artifact_id.clone())
            .collect()
    }
}

/// The answer to a [`ResolveRequest`].
#[derive(Debug, Clone)]
pub enum Resolution {
    Versions(VersionRangeResult),
    Artifact(ArtifactResult),
    Descriptor(DescriptorResult),
}

/// Resolves coordinates against remote repositories through a transport.
pub struct RepositorySystem {
    transport: Box<dyn Transport>,
}

impl std::fmt::Debug for RepositorySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySystem").finish_non_exhaustive()
    }
}

impl RepositorySystem {
    pub fn new(transport: impl Transport + 'static) -> Self {
        RepositorySystem {
            transport: Box::new(transport),
        }
    }

    /// Serve any kind of request.
    pub fn resolve(
        &self,
        session: &ResolutionSession,
        request: &ResolveRequest<'_>,
    ) -> Result<Resolution> {
        let (coordinate, repositories) = (&request.coordinate, request.repositories);
        match request.kind {
            RequestKind::VersionRange => self
                .resolve_version_range(session, coordinate, repositories)
                .map(Resolution::Versions),
            RequestKind::Artifact => self
                .resolve_artifact(session, coordinate, repositories)
                .map(Resolution::Artifact),
            RequestKind::Descriptor => self
                .read_descriptor(session, coordinate, repositories)
                .map(Resolution::Descriptor),
        }
    }

    /// Versions of `coordinate` matching its version constraint.
    ///
    /// An exact version resolves to itself without contacting any
    /// repository. Fails only when the constraint is malformed or every
    /// repository failed.
    pub fn resolve_version_range(
        &self,
        session: &ResolutionSession,
        coordinate: &Coordinate,
        repositories: &[RemoteRepository],
    ) -> Result<VersionRangeResult> {
        let constraint = VersionConstraint::parse(&coordinate.version)?;
        if let VersionConstraint::Exact(version) = &constraint {
            return Ok(VersionRangeResult {
                versions: vec![version.clone()],
                constraint,
                failures: Vec::new(),
            });
        }

        let mut state = session.lock();
        let resource = format!("{}{}", coordinate.artifact_dir(), METADATA_FILE);
        let mut versions: Vec<Version> = Vec::new();
        let mut failures = Vec::new();

        for repo in repositories {
            let cache_path = session.cache().metadata_path(coordinate, false, repo.id());
            match self.fetch_metadata(session, &mut state, repo, &resource, &cache_path) {
                Ok(Some(metadata)) => {
                    for listed in metadata.versions() {
                        let Ok(version) = Version::parse(&listed) else {
                            continue;
                        };
                        if constraint.contains(&version) && !versions.contains(&version) {
                            versions.push(version);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        repository = %repo.id(),
                        error = %e,
                        "Could not read version list"
                    );
                    failures.push(RepositoryFailure::new(repo.id(), &e));
                }
            }
        }

        if failures.len() == repositories.len() {
            return Err(RepoError::VersionRange {
                coordinate: coordinate.to_string(),
                attempts: failures,
            });
        }

        versions.sort();
        Ok(VersionRangeResult {
            constraint,
            versions,
            failures,
        })
    }

    /// Download the artifact for an exact coordinate into the local cache.
    pub fn resolve_artifact(
        &self,
        session: &ResolutionSession,
        coordinate: &Coordinate,
        repositories: &[RemoteRepository],
    ) -> Result<ArtifactResult> {
        let mut state = session.lock();
        self.resolve_artifact_locked(session, &mut state, coordinate, repositories)
    }

    /// Read the `.pom` descriptor of an exact coordinate.
    pub fn read_descriptor(
        &self,
        session: &ResolutionSession,
        coordinate: &Coordinate,
        repositories: &[RemoteRepository],
    ) -> Result<DescriptorResult> {
        let pom_coordinate = coordinate.with_extension("pom");
        let mut state = session.lock();

        let artifact =
            match self.resolve_artifact_locked(session, &mut state, &pom_coordinate, repositories) {
                Ok(artifact) => artifact,
                Err(RepoError::ArtifactResolution { attempts, .. }) => {
                    session.emit(RepositoryEvent::DescriptorMissing {
                        artifact: coordinate,
                    });
                    return Err(RepoError::Descriptor {
                        coordinate: coordinate.to_string(),
                        attempts,
                    });
                }
                Err(e) => return Err(e),
            };

        let bytes = session
            .cache()
            .read(&artifact.file)?
            .ok_or_else(|| RepoError::cache(&artifact.file, "descriptor vanished from cache"))?;

        match Pom::parse(&bytes) {
            Ok(pom) => Ok(DescriptorResult {
                coordinate: coordinate.clone(),
                repository: artifact.repository,
                pom,
            }),
            Err(e) => {
                let detail = e.to_string();
                session.emit(RepositoryEvent::DescriptorInvalid {
                    artifact: coordinate,
                    detail: &detail,
                });
                Err(RepoError::Descriptor {
                    coordinate: coordinate.to_string(),
                    attempts: vec![RepositoryFailure::new(
                        &artifact.repository,
                        format!("invalid descriptor: {detail}"),
                    )],
                })
            }
        }
    }

    fn resolve_artifact_locked(
        &self,
        session: &ResolutionSession,
        state: &mut SessionState,
        coordinate: &Coordinate,
        repositories: &[RemoteRepository],
    ) -> Result<ArtifactResult> {
        if !VersionConstraint::parse(&coordinate.version)?.is_exact() {
            return Err(RepoError::InvalidVersion {
                version: coordinate.version.clone(),
                detail: "artifact resolution needs an exact version".to_string(),
            });
        }
        session.emit(RepositoryEvent::ArtifactResolving {
            artifact: coordinate,
        });

        let cached = match session.cache().lookup_artifact(coordinate)? {
            // A copy downloaded from a repository outside this request is not used.
            CacheLookup::Hit(hit) if repositories.iter().any(|r| r.id() == hit.repository) => {
                Some(hit)
            }
            CacheLookup::Hit(hit) => {
                tracing::debug!(
                    artifact = %coordinate,
                    repository = %hit.repository,
                    "Ignoring cached copy from unconfigured repository"
                );
                None
            }
            CacheLookup::Miss => None,
            CacheLookup::Corrupted(path) => {
                let resource = TransferResource::new("", path.display().to_string());
                session.transfer_listener().transfer_corrupted(
                    &resource,
                    "checksum mismatch in local cache, fetching again",
                );
                None
            }
        };

        // Releases and timestamped builds never change once cached;
        // `-SNAPSHOT` follows the update policy.
        let key = format!("artifact:{coordinate}");
        let now = SystemTime::now();
        if let Some(hit) = &cached {
            let fresh = !coordinate.version.ends_with("-SNAPSHOT")
                || session.is_offline()
                || state.known(&key, Some(hit.modified), session.update_policy(), now)
                    == Known::Present;
            if fresh {
                return Ok(resolved(session, coordinate, hit.path.clone(), &hit.repository));
            }
        }

        if session.is_offline() {
            let attempts = repositories
                .iter()
                .map(|repo| {
                    let url = repo
                        .resolve(&coordinate.path(&coordinate.version))
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| repo.url().to_string());
                    RepositoryFailure::new(repo.id(), RepoError::Offline { url })
                })
                .collect();
            return Err(RepoError::ArtifactResolution {
                coordinate: coordinate.to_string(),
                attempts,
            });
        }

        let mut attempts = Vec::new();
        for repo in repositories {
            match self.fetch_artifact(session, state, repo, coordinate) {
                Ok(Some(result)) => {
                    state.record(&key, true, now);
                    return Ok(result);
                }
                Ok(None) => attempts.push(RepositoryFailure::new(repo.id(), "not found")),
                Err(e) => {
                    tracing::warn!(
                        repository = %repo.id(),
                        artifact = %coordinate,
                        error = %e,
                        "Artifact transfer failed"
                    );
                    attempts.push(RepositoryFailure::new(repo.id(), &e));
                }
            }
        }

        if let Some(hit) = cached {
            tracing::warn!(
                artifact = %coordinate,
                "No repository could refresh snapshot, using cached copy"
            );
            state.record(&key, true, now);
            return Ok(resolved(session, coordinate, hit.path, &hit.repository));
        }

        Err(RepoError::ArtifactResolution {
            coordinate: coordinate.to_string(),
            attempts,
        })
    }

    /// Try one repository. `Ok(None)` means it does not have the artifact.
    fn fetch_artifact(
        &self,
        session: &ResolutionSession,
        state: &mut SessionState,
        repo: &RemoteRepository,
        coordinate: &Coordinate,
    ) -> Result<Option<ArtifactResult>> {
        let file_version = if coordinate.version.ends_with("-SNAPSHOT") {
            let resource = format!("{}{}", coordinate.version_dir(), METADATA_FILE);
            let cache_path = session.cache().metadata_path(coordinate, true, repo.id());
            self.fetch_metadata(session, state, repo, &resource, &cache_path)?
                .and_then(|md| {
                    md.snapshot_file_version(&coordinate.base_version(), &coordinate.extension)
                })
                .unwrap_or_else(|| coordinate.version.clone())
        } else {
            coordinate.version.clone()
        };

        let resource = coordinate.path(&file_version);
        let url = repo.resolve(&resource)?;
        let now = SystemTime::now();
        if state.known(url.as_str(), None, session.update_policy(), now) == Known::Missing {
            return Ok(None);
        }

        session.emit(RepositoryEvent::ArtifactDownloading {
            artifact: coordinate,
            repository: repo.id(),
        });
        let Some(bytes) = self.download(session, repo, &url, &resource)? else {
            state.record(url.as_str(), false, now);
            return Ok(None);
        };

        let file = session.cache().store_artifact(coordinate, repo.id(), &bytes)?;
        state.record(url.as_str(), true, now);
        session.emit(RepositoryEvent::ArtifactDownloaded {
            artifact: coordinate,
            repository: repo.id(),
        });
        Ok(Some(resolved(session, coordinate, file, repo.id())))
    }

    /// Metadata of one repository, from cache when fresh.
    ///
    /// `Ok(None)` means the repository has no such metadata.
    fn fetch_metadata(
        &self,
        session: &ResolutionSession,
        state: &mut SessionState,
        repo: &RemoteRepository,
        resource: &str,
        cache_path: &Path,
    ) -> Result<Option<Metadata>> {
        session.emit(RepositoryEvent::MetadataResolving {
            metadata: resource,
            repository: repo.id(),
        });
        let url = repo.resolve(resource)?;
        let cached = session.cache().modified(cache_path);
        let now = SystemTime::now();

        let known = if session.is_offline() {
            match cached {
                Some(_) => Known::Present,
                None => return Err(RepoError::Offline { url: url.to_string() }),
            }
        } else {
            state.known(url.as_str(), cached, session.update_policy(), now)
        };

        match known {
            Known::Missing => return Ok(None),
            Known::Present => {
                if let Some(metadata) = read_cached_metadata(session, resource, cache_path)? {
                    session.emit(RepositoryEvent::MetadataResolved {
                        metadata: resource,
                        repository: repo.id(),
                    });
                    return Ok(Some(metadata));
                }
            }
            Known::Unknown => {}
        }
        if session.is_offline() {
            return Err(RepoError::Offline { url: url.to_string() });
        }

        session.emit(RepositoryEvent::MetadataDownloading {
            metadata: resource,
            repository: repo.id(),
        });
        let bytes = match self.download(session, repo, &url, resource) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                state.record(url.as_str(), false, now);
                session.cache().remove(cache_path)?;
                return Ok(None);
            }
            Err(e) => {
                if cached.is_some() {
                    if let Some(metadata) = read_cached_metadata(session, resource, cache_path)? {
                        tracing::warn!(url = %url, error = %e, "Using stale cached metadata");
                        return Ok(Some(metadata));
                    }
                }
                return Err(e);
            }
        };

        let metadata = match Metadata::parse(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                let detail = e.to_string();
                session.emit(RepositoryEvent::MetadataInvalid {
                    metadata: resource,
                    detail: &detail,
                });
                return Err(e);
            }
        };
        session.cache().write(cache_path, &bytes)?;
        state.record(url.as_str(), true, now);

        session.emit(RepositoryEvent::MetadataDownloaded {
            metadata: resource,
            repository: repo.id(),
        });
        session.emit(RepositoryEvent::MetadataResolved {
            metadata: resource,
            repository: repo.id(),
        });
        Ok(Some(metadata))
    }

    /// Fetch one resource, reporting to the session's transfer listener.
    fn download(
        &self,
        session: &ResolutionSession,
        repo: &RemoteRepository,
        url: &Url,
        resource_name: &str,
    ) -> Result<Option<Vec<u8>>> {
        let listener = session.transfer_listener();
        let resource = TransferResource::new(repo.url().as_str(), resource_name);

        listener.transfer_initiated(&resource);
        listener.transfer_started(&resource);
        let result = self.transport.get(url, &mut |done, total| {
            listener.transfer_progressed(&resource, done, total)
        });

        match &result {
            Ok(Some(bytes)) => listener.transfer_succeeded(&resource, bytes.len() as u64),
            Ok(None) => listener.transfer_failed(&resource, &TransferFailure::NotFound),
            Err(e) => listener.transfer_failed(&resource, &TransferFailure::Error(e.to_string())),
        }
        result
    }
}

fn resolved(
    session: &ResolutionSession,
    coordinate: &Coordinate,
    file: PathBuf,
    repository: &str,
) -> ArtifactResult {
    session.emit(RepositoryEvent::ArtifactResolved {
        artifact: coordinate,
        repository,
        file: &file,
    });
    ArtifactResult {
        coordinate: coordinate.clone(),
        file,
        repository: repository.to_string(),
    }
}

/// Parse a cached metadata file, discarding it if unreadable.
fn read_cached_metadata(
    session: &ResolutionSession,
    resource: &str,
    cache_path: &Path,
) -> Result<Option<Metadata>> {
    let Some(bytes) = session.cache().read(cache_path)? else {
        return Ok(None);
    };
    match Metadata::parse(&bytes) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) => {
            let detail = e.to_string();
            session.emit(RepositoryEvent::MetadataInvalid {
                metadata: resource,
                detail: &detail,
            });
            session.cache().remove(cache_path)?;
            Ok(None)
        }
    }
}
