//! Tree-based index origin backed by a git mirror.
//!
//! Layout of the remote index:
//! ```text
//! <repo>/
//!   modules/
//!     <ModuleName>/
//!       module.txt    - JSON module descriptor
//! ```
//!
//! All reads go through the HEAD commit of the local mirror, never the
//! working tree, so a descriptor reflects the snapshot at the time of the
//! call.

use std::path::{Path, PathBuf};

use regex::Regex;

use super::git::{GitBackend, GitCli};
use super::{ensure_writable_dir, IndexOrigin, RefreshOutcome};
use crate::descriptor::ModuleDescriptor;
use crate::error::{IndexError, Result};

/// Name under which the remote index is registered.
pub const DEFAULT_REMOTE: &str = "origin";

/// Branch pulled from the remote index.
pub const DEFAULT_BRANCH: &str = "master";

/// Paths that hold module descriptors.
pub const DEFAULT_DESCRIPTOR_PATTERN: &str = r"^modules/[^/]+/module\.txt$";

const HEAD: &str = "HEAD";

/// An index origin mirrored as a local git repository.
pub struct TreeOrigin {
    local_path: PathBuf,
    remote_url: String,
    remote: String,
    branch: String,
    pattern: Regex,
    git: Box<dyn GitBackend>,
}

impl std::fmt::Debug for TreeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeOrigin")
            .field("local_path", &self.local_path)
            .field("remote_url", &self.remote_url)
            .field("branch", &self.branch)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl TreeOrigin {
    /// Mirror `remote_url` into `local_path` using the `git` executable.
    pub fn new(local_path: impl Into<PathBuf>, remote_url: impl Into<String>) -> Result<Self> {
        Ok(TreeOrigin {
            local_path: local_path.into(),
            remote_url: remote_url.into(),
            remote: DEFAULT_REMOTE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            pattern: Regex::new(DEFAULT_DESCRIPTOR_PATTERN)?,
            git: Box::new(GitCli::new()),
        })
    }

    /// Use a different git backend.
    pub fn with_git(mut self, git: impl GitBackend + 'static) -> Self {
        self.git = Box::new(git);
        self
    }

    /// Pull a different branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Register the remote under a different name.
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Match descriptor paths with a different regular expression.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Location of the local mirror.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// URL of the remote index.
    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }
}

impl IndexOrigin for TreeOrigin {
    fn describe(&self) -> String {
        format!("git {} ({})", self.remote_url, self.branch)
    }

    fn ensure_local(&mut self) -> Result<()> {
        if self.git.is_repository(&self.local_path) {
            tracing::info!(path = %self.local_path.display(), "Found repository");
            match self.git.remote_url(&self.local_path, &self.remote)? {
                None => self
                    .git
                    .add_remote(&self.local_path, &self.remote, &self.remote_url)?,
                Some(url) if url != self.remote_url => {
                    tracing::warn!(
                        remote = %self.remote,
                        configured = %self.remote_url,
                        actual = %url,
                        "Mirror is registered against a different remote"
                    );
                }
                Some(_) => {}
            }
            return Ok(());
        }

        ensure_writable_dir(&self.local_path)?;
        self.git
            .init(&self.local_path)
            .map_err(|e| IndexError::storage(&self.local_path, e))?;
        self.git
            .add_remote(&self.local_path, &self.remote, &self.remote_url)
            .map_err(|e| IndexError::storage(&self.local_path, e))?;
        tracing::info!(
            path = %self.local_path.display(),
            remote = %self.remote_url,
            "Created index mirror"
        );
        Ok(())
    }

    fn has_content(&self) -> Result<bool> {
        if !self.git.is_repository(&self.local_path) {
            return Ok(false);
        }
        Ok(self.git.head(&self.local_path)?.is_some())
    }

    fn refresh(&mut self) -> Result<RefreshOutcome> {
        let outcome = self.git.pull(&self.local_path, &self.remote, &self.branch)?;
        tracing::info!(uri = %outcome.fetched_from, "Fetching from uri");

        if !outcome.is_successful() {
            tracing::info!(conflicts = ?outcome.conflicts, "Merge status: conflicting");
            return Err(IndexError::SyncConflict {
                paths: outcome.conflicts,
            });
        }
        tracing::info!(changed = outcome.changed(), "Merge status: merged");

        Ok(RefreshOutcome {
            changed: outcome.changed(),
            fetched_from: outcome.fetched_from,
        })
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        if self.git.head(&self.local_path)?.is_none() {
            tracing::debug!(path = %self.local_path.display(), "Repository is empty");
            return Ok(Vec::new());
        }

        let entries: Vec<String> = self
            .git
            .list_files(&self.local_path, HEAD)?
            .into_iter()
            .filter(|path| self.pattern.is_match(path))
            .collect();
        tracing::debug!(entries = ?entries, "Found module infos");
        Ok(entries)
    }

    fn read_descriptor(&self, entry: &str) -> Result<ModuleDescriptor> {
        if self.git.head(&self.local_path)?.is_none() {
            return Err(IndexError::NotFound {
                path: entry.to_string(),
            });
        }

        let bytes = self
            .git
            .read_file(&self.local_path, HEAD, entry)?
            .ok_or_else(|| IndexError::NotFound {
                path: entry.to_string(),
            })?;
        ModuleDescriptor::from_slice(&bytes, entry)
    }

    fn read_descriptors(&self, entries: &[String]) -> Result<Vec<Result<ModuleDescriptor>>> {
        let not_found = |entry: &String| IndexError::NotFound {
            path: entry.clone(),
        };
        let Some(head) = self.git.head(&self.local_path)? else {
            return Ok(entries.iter().map(|entry| Err(not_found(entry))).collect());
        };

        let files = self.git.read_files(&self.local_path, &head, entries)?;
        if files.len() != entries.len() {
            return Err(IndexError::Git {
                command: "read files".to_string(),
                detail: format!("asked for {} files, got {}", entries.len(), files.len()),
            });
        }
        Ok(entries
            .iter()
            .zip(files)
            .map(|(entry, bytes)| match bytes {
                Some(bytes) => ModuleDescriptor::from_slice(&bytes, entry),
                None => Err(not_found(entry)),
            })
            .collect())
    }
}
