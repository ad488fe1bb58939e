//! Flat-document index origin.
//!
//! The remote index is a single JSON object whose keys are module ids and
//! whose values are full module descriptors. The last successfully fetched
//! document is kept at `<local_path>/index.json` so the catalog can be
//! rebuilt without network access.

use std::path::{Path, PathBuf};

use super::fetch::{DocumentFetcher, HttpDocumentFetcher};
use super::{ensure_writable_dir, IndexOrigin, RefreshOutcome};
use crate::descriptor::ModuleDescriptor;
use crate::error::{IndexError, Result};

/// File name of the locally mirrored document.
pub const DOCUMENT_FILE: &str = "index.json";

type Document = serde_json::Map<String, serde_json::Value>;

/// An index origin backed by one JSON document.
pub struct DocumentOrigin {
    local_path: PathBuf,
    location: String,
    fetcher: Box<dyn DocumentFetcher>,
    document: Option<Document>,
}

impl std::fmt::Debug for DocumentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentOrigin")
            .field("local_path", &self.local_path)
            .field("location", &self.location)
            .field("entries", &self.document.as_ref().map(|d| d.len()))
            .finish()
    }
}

impl DocumentOrigin {
    /// Mirror the document at `location` into `local_path`.
    pub fn new(local_path: impl Into<PathBuf>, location: impl Into<String>) -> Result<Self> {
        Ok(Self::with_fetcher(
            local_path,
            location,
            HttpDocumentFetcher::new()?,
        ))
    }

    /// Use a specific fetcher.
    pub fn with_fetcher(
        local_path: impl Into<PathBuf>,
        location: impl Into<String>,
        fetcher: impl DocumentFetcher + 'static,
    ) -> Self {
        DocumentOrigin {
            local_path: local_path.into(),
            location: location.into(),
            fetcher: Box::new(fetcher),
            document: None,
        }
    }

    /// Location of the remote document.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Path of the local copy.
    pub fn document_path(&self) -> PathBuf {
        self.local_path.join(DOCUMENT_FILE)
    }

    fn parse_document(bytes: &[u8], source: &str) -> Result<Document> {
        let root: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| IndexError::Parse {
                source_name: source.to_string(),
                detail: e.to_string(),
            })?;
        match root {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(IndexError::Parse {
                source_name: source.to_string(),
                detail: "root element must be a map".to_string(),
            }),
        }
    }

    fn load_local(&mut self) -> Result<()> {
        let path = self.document_path();
        if !path.is_file() {
            return Ok(());
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| IndexError::storage(&path, format!("reading index copy: {e}")))?;
        match Self::parse_document(&bytes, &path.display().to_string()) {
            Ok(document) => {
                tracing::info!(path = %path.display(), "Found local index copy");
                self.document = Some(document);
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Ignoring corrupt local index copy"
                );
            }
        }
        Ok(())
    }

    fn store_local(&self, bytes: &[u8]) -> Result<()> {
        let target = self.document_path();
        let tmp = self
            .local_path
            .join(format!(".{DOCUMENT_FILE}.{}", uuid::Uuid::new_v4()));
        write_then_rename(&tmp, &target, bytes)
            .map_err(|e| IndexError::storage(&target, format!("writing index copy: {e}")))
    }
}

fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(tmp, bytes)?;
    if let Err(e) = std::fs::rename(tmp, target) {
        let _ = std::fs::remove_file(tmp);
        return Err(e);
    }
    Ok(())
}

impl IndexOrigin for DocumentOrigin {
    fn describe(&self) -> String {
        format!("document {}", self.location)
    }

    fn ensure_local(&mut self) -> Result<()> {
        ensure_writable_dir(&self.local_path)?;
        if self.document.is_none() {
            self.load_local()?;
        }
        Ok(())
    }

    fn has_content(&self) -> Result<bool> {
        Ok(self.document.is_some())
    }

    fn refresh(&mut self) -> Result<RefreshOutcome> {
        tracing::info!(uri = %self.location, "Fetching index document");
        let bytes = self.fetcher.fetch(&self.location)?;
        let document = Self::parse_document(&bytes, &self.location)?;

        let changed = self.document.as_ref() != Some(&document);
        self.store_local(&bytes)?;
        self.document = Some(document);

        Ok(RefreshOutcome {
            fetched_from: self.location.clone(),
            changed,
        })
    }

    fn list_entries(&self) -> Result<Vec<String>> {
        Ok(self
            .document
            .as_ref()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_descriptor(&self, entry: &str) -> Result<ModuleDescriptor> {
        let value = self
            .document
            .as_ref()
            .and_then(|d| d.get(entry))
            .ok_or_else(|| IndexError::NotFound {
                path: entry.to_string(),
            })?;
        ModuleDescriptor::from_value(value.clone(), entry)
    }
}
