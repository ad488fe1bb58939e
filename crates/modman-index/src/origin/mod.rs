//! Index origins: where module descriptors come from.
//!
//! Two flavours share one contract:
//! - [`TreeOrigin`] mirrors a git repository of `modules/<name>/module.txt` files
//! - [`DocumentOrigin`] fetches one JSON object keyed by module id
//!
//! The synchronizer only talks to the [`IndexOrigin`] trait.

mod document;
mod fetch;
mod git;
mod tree;

pub use document::DocumentOrigin;
pub use fetch::{DocumentFetcher, HttpDocumentFetcher};
pub use git::{GitBackend, GitCli, PullOutcome};
pub use tree::{TreeOrigin, DEFAULT_BRANCH, DEFAULT_DESCRIPTOR_PATTERN, DEFAULT_REMOTE};

use crate::descriptor::ModuleDescriptor;
use crate::error::Result;

/// Result of pulling new content from an origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Where the content was fetched from.
    pub fetched_from: String,
    /// Whether the local mirror changed.
    pub changed: bool,
}

/// A remote source of module descriptors with a local mirror.
pub trait IndexOrigin: Send {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    /// Create the local mirror if it does not exist yet.
    ///
    /// Fails with a storage error when the mirror location is not writable.
    fn ensure_local(&mut self) -> Result<()>;

    /// Whether the local mirror already holds content that can be parsed.
    fn has_content(&self) -> Result<bool>;

    /// Pull the latest content from the remote into the local mirror.
    fn refresh(&mut self) -> Result<RefreshOutcome>;

    /// Names of all descriptor entries in the current snapshot.
    ///
    /// Order is unspecified.
    fn list_entries(&self) -> Result<Vec<String>>;

    /// Read and parse one descriptor entry from the current snapshot.
    fn read_descriptor(&self, entry: &str) -> Result<ModuleDescriptor>;

    /// Read every entry of `entries`, in order, from one snapshot.
    ///
    /// The outer error means nothing could be read at all.
    fn read_descriptors(&self, entries: &[String]) -> Result<Vec<Result<ModuleDescriptor>>> {
        Ok(entries.iter().map(|entry| self.read_descriptor(entry)).collect())
    }
}

/// Check that `dir` exists (creating it if needed) and accepts writes.
pub(crate) fn ensure_writable_dir(dir: &std::path::Path) -> Result<()> {
    use crate::error::IndexError;

    std::fs::create_dir_all(dir)
        .map_err(|e| IndexError::storage(dir, format!("creating mirror directory: {e}")))?;

    let marker = dir.join(format!(".modman-write-check-{}", uuid::Uuid::new_v4()));
    std::fs::write(&marker, b"")
        .map_err(|e| IndexError::storage(dir, format!("mirror is not writable: {e}")))?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}
