//! Remote artifact repository resolution for modman.
//!
//! Resolves module artifacts, their versions and their declared
//! dependencies against an ordered list of Maven-layout repositories,
//! caching everything in a local repository shared by one session.
//!
//! # Architecture
//!
//! - **Connector**: module-level queries (`find_available_versions`,
//!   `download_artifact`, `get_dependencies`) over configured repositories
//! - **Resolver**: the request protocol; first repository with an answer wins
//! - **Session**: local cache, update policy and event listeners
//!
//! Versions follow Maven ordering and range syntax.

pub mod cache;
pub mod connector;
pub mod coordinate;
pub mod error;
pub mod events;
pub mod metadata;
pub mod pom;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod version;

#[cfg(test)]
mod testing;

// Re-exports for convenience.
pub use cache::{CacheLookup, CachedArtifact, LocalCache};
pub use connector::RepositoryConnector;
pub use coordinate::{Coordinate, DEFAULT_EXTENSION, DEFAULT_GROUP};
pub use error::{RepoError, RepositoryFailure, Result};
pub use events::{
    LoggingRepositoryListener, LoggingTransferListener, NoopListener, RepositoryEvent,
    RepositoryListener, TransferFailure, TransferListener, TransferResource,
};
pub use pom::{Pom, PomDependency};
pub use repository::RemoteRepository;
pub use resolver::{
    ArtifactResult, DescriptorResult, RepositorySystem, RequestKind, Resolution, ResolveRequest,
    VersionRangeResult,
};
pub use session::{ResolutionSession, UpdatePolicy};
pub use transport::{DefaultTransport, FileTransport, HttpTransport, Transport};
pub use version::{Version, VersionConstraint, VersionRange};
