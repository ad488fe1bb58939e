//! Repository connector: module-level queries over an ordered list of
//! remote repositories sharing one resolution session.

use std::path::{Path, PathBuf};

use crate::coordinate::{Coordinate, DEFAULT_EXTENSION, DEFAULT_GROUP};
use crate::error::Result;
use crate::repository::{RemoteRepository, DEFAULT_LAYOUT};
use crate::resolver::RepositorySystem;
use crate::session::ResolutionSession;
use crate::transport::{DefaultTransport, Transport};
use crate::version::VersionConstraint;

/// Resolves module artifacts against the configured repositories.
///
/// Every call goes through the same [`ResolutionSession`], so repeated
/// queries are answered from the local cache.
#[derive(Debug)]
pub struct RepositoryConnector {
    system: RepositorySystem,
    session: ResolutionSession,
    repositories: Vec<RemoteRepository>,
    group: String,
}

impl RepositoryConnector {
    /// Connector caching under `cache_root`, with HTTP and `file://`
    /// transports and no request timeout.
    pub fn new(cache_root: impl Into<PathBuf>) -> Result<Self> {
        let system = RepositorySystem::new(DefaultTransport::new(None)?);
        Ok(Self::from_parts(system, ResolutionSession::new(cache_root)))
    }

    /// Connector over an existing system and session.
    pub fn from_parts(system: RepositorySystem, session: ResolutionSession) -> Self {
        RepositoryConnector {
            system,
            session,
            repositories: Vec::new(),
            group: DEFAULT_GROUP.to_string(),
        }
    }

    /// Connector caching under `cache_root` that fetches through `transport`.
    pub fn with_transport(
        cache_root: impl Into<PathBuf>,
        transport: impl Transport + 'static,
    ) -> Self {
        Self::from_parts(
            RepositorySystem::new(transport),
            ResolutionSession::new(cache_root),
        )
    }

    /// Use `group` for all module coordinates instead of the default.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Append a repository; it is tried after all previously added ones.
    pub fn add_repository(&mut self, id: &str, url: &str) -> Result<()> {
        let repository = RemoteRepository::new(id, url)?;
        tracing::debug!(
            id = %id,
            url = %repository.url(),
            layout = DEFAULT_LAYOUT,
            "Added repository"
        );
        self.repositories.push(repository);
        Ok(())
    }

    /// Configured repositories in lookup order.
    pub fn repositories(&self) -> &[RemoteRepository] {
        &self.repositories
    }

    /// Session shared by all calls on this connector.
    pub fn session(&self) -> &ResolutionSession {
        &self.session
    }

    /// Group id used for module coordinates.
    pub fn group(&self) -> &str {
        &self.group
    }

    fn coordinate(&self, module_id: &str, version: &str) -> Result<Coordinate> {
        Coordinate::new(&self.group, module_id, DEFAULT_EXTENSION, version)
    }

    /// All versions of `module_id` published in any repository, ascending.
    ///
    /// Best effort: failures are logged and yield an empty list.
    pub fn find_available_versions(&self, module_id: &str) -> Vec<String> {
        let result = self
            .coordinate(module_id, &VersionConstraint::any().to_string())
            .and_then(|c| self.system.resolve_version_range(&self.session, &c, &self.repositories));

        match result {
            Ok(found) => {
                for failure in &found.failures {
                    tracing::warn!(
                        module = %module_id,
                        repository = %failure.repository,
                        reason = %failure.reason,
                        "Repository skipped while listing versions"
                    );
                }
                found.versions.iter().map(ToString::to_string).collect()
            }
            Err(e) => {
                tracing::error!(
                    module = %module_id,
                    error = %e,
                    "Failed to resolve remote versions"
                );
                Vec::new()
            }
        }
    }

    /// Download one exact version of a module, returning the cached file.
    pub fn download_artifact(&self, module_id: &str, version: &str) -> Result<PathBuf> {
        let coordinate = self.coordinate(module_id, version)?;
        let artifact = self
            .system
            .resolve_artifact(&self.session, &coordinate, &self.repositories)?;
        tracing::info!(
            module = %module_id,
            version = %version,
            repository = %artifact.repository,
            "Artifact available"
        );
        Ok(artifact.file)
    }

    /// Ids of the direct dependencies declared by a module version.
    pub fn get_dependencies(&self, module_id: &str, version: &str) -> Result<Vec<String>> {
        let coordinate = self.coordinate(module_id, version)?;
        let descriptor = self
            .system
            .read_descriptor(&self.session, &coordinate, &self.repositories)?;
        Ok(descriptor.dependency_ids())
    }

    /// Root of the local artifact cache.
    pub fn cache_root(&self) -> &Path {
        self.session.cache().root()
    }
}
