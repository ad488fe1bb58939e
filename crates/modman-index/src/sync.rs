//! Module index synchronizer.
//!
//! Owns one [`IndexOrigin`] and the [`ModuleCatalog`] built from it.
//! Refreshes are serialized: at most one pull-and-reparse runs at a time
//! per synchronizer, because a reparse rebuilds the whole catalog.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{CatalogBuilder, CatalogSnapshot, ModuleCatalog, ParseReport};
use crate::descriptor::ModuleDescriptor;
use crate::error::Result;
use crate::origin::IndexOrigin;

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Where the index content came from.
    pub origin: String,
    /// Whether the local mirror changed.
    pub changed: bool,
    /// Result of reparsing the mirror.
    pub report: ParseReport,
}

/// Keeps a local index mirror and its catalog in step.
pub struct IndexSynchronizer {
    origin: Mutex<Box<dyn IndexOrigin>>,
    catalog: Arc<ModuleCatalog>,
}

impl std::fmt::Debug for IndexSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSynchronizer")
            .field("origin", &self.lock().describe())
            .field("modules", &self.catalog.len())
            .finish()
    }
}

impl IndexSynchronizer {
    /// Wrap an origin without touching the filesystem.
    pub fn new(origin: impl IndexOrigin + 'static) -> Self {
        IndexSynchronizer {
            origin: Mutex::new(Box::new(origin)),
            catalog: Arc::new(ModuleCatalog::new()),
        }
    }

    /// Wrap an origin, create its local mirror if needed, and load the
    /// catalog from any content the mirror already holds.
    pub fn open(origin: impl IndexOrigin + 'static) -> Result<Self> {
        let sync = Self::new(origin);
        {
            let mut origin = sync.lock();
            origin.ensure_local()?;
            if origin.has_content()? {
                reparse(origin.as_ref(), &sync.catalog)?;
            }
        }
        Ok(sync)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn IndexOrigin>> {
        self.origin.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the local mirror if it does not exist yet.
    pub fn ensure_local(&self) -> Result<()> {
        self.lock().ensure_local()
    }

    /// Pull the latest index and rebuild the catalog.
    ///
    /// On a sync conflict or transport failure the catalog is left exactly
    /// as it was.
    pub fn refresh(&self) -> Result<SyncReport> {
        let mut origin = self.lock();
        let outcome = origin.refresh()?;
        let report = reparse(origin.as_ref(), &self.catalog)?;
        tracing::info!(
            origin = %origin.describe(),
            changed = outcome.changed,
            parsed = report.parsed,
            skipped = report.skipped.len(),
            "Index refreshed"
        );
        Ok(SyncReport {
            origin: outcome.fetched_from,
            changed: outcome.changed,
            report,
        })
    }

    /// Rebuild the catalog from the mirror's current snapshot.
    pub fn reparse_all(&self) -> Result<ParseReport> {
        let origin = self.lock();
        reparse(origin.as_ref(), &self.catalog)
    }

    /// Descriptor entries in the mirror's current snapshot.
    pub fn list_module_descriptor_paths(&self) -> Result<Vec<String>> {
        self.lock().list_entries()
    }

    /// Read one descriptor from the mirror's current snapshot.
    pub fn read_descriptor(&self, entry: &str) -> Result<ModuleDescriptor> {
        self.lock().read_descriptor(entry)
    }

    /// The catalog maintained by this synchronizer.
    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    /// Snapshot of all catalogued modules.
    pub fn get_all(&self) -> CatalogSnapshot {
        self.catalog.get_all()
    }

    /// Look up one module by id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<ModuleDescriptor>> {
        self.catalog.get_by_id(id)
    }
}

/// Parse every entry into a fresh catalog generation and swap it in.
///
/// One bad entry never aborts the pass. If the entries cannot even be
/// listed or read, the catalog is wiped so no stale generation survives.
fn reparse(origin: &dyn IndexOrigin, catalog: &ModuleCatalog) -> Result<ParseReport> {
    let read = origin
        .list_entries()
        .and_then(|entries| Ok((origin.read_descriptors(&entries)?, entries)));
    let (descriptors, entries) = match read {
        Ok(read) => read,
        Err(e) => {
            catalog.clear();
            return Err(e);
        }
    };

    let builder = entries.iter().zip(descriptors).fold(
        CatalogBuilder::new(),
        |builder, (entry, descriptor)| match descriptor {
            Ok(descriptor) => builder.insert(descriptor),
            Err(e) => builder.skip(entry, &e),
        },
    );

    Ok(builder.commit(catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::origin::{DocumentOrigin, RefreshOutcome};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory origin: a list of (entry, json) pairs.
    #[derive(Clone, Default)]
    struct MemoryOrigin {
        entries: Arc<Mutex<Vec<(String, String)>>>,
        conflict: Arc<AtomicBool>,
        busy: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        refreshes: Arc<AtomicUsize>,
    }

    impl MemoryOrigin {
        fn with(entries: &[(&str, &str)]) -> Self {
            let origin = Self::default();
            origin.set(entries);
            origin
        }

        fn set(&self, entries: &[(&str, &str)]) {
            *self.entries.lock().unwrap() = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
    }

    impl IndexOrigin for MemoryOrigin {
        fn describe(&self) -> String {
            "memory".to_string()
        }

        fn ensure_local(&mut self) -> Result<()> {
            Ok(())
        }

        fn has_content(&self) -> Result<bool> {
            Ok(!self.entries.lock().unwrap().is_empty())
        }

        fn refresh(&mut self) -> Result<RefreshOutcome> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            self.busy.store(false, Ordering::SeqCst);

            if self.conflict.load(Ordering::SeqCst) {
                return Err(IndexError::SyncConflict {
                    paths: vec!["modules/A/module.txt".to_string()],
                });
            }
            Ok(RefreshOutcome {
                fetched_from: "memory".to_string(),
                changed: false,
            })
        }

        fn list_entries(&self) -> Result<Vec<String>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .map(|(k, _)| k.clone())
                .collect())
        }

        fn read_descriptor(&self, entry: &str) -> Result<ModuleDescriptor> {
            let entries = self.entries.lock().unwrap();
            // Last matching entry wins so duplicate names can be modelled.
            let json = entries
                .iter()
                .rev()
                .find(|(k, _)| k == entry)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| IndexError::NotFound {
                    path: entry.to_string(),
                })?;
            ModuleDescriptor::from_slice(json.as_bytes(), entry)
        }
    }

    #[test]
    fn reparse_populates_catalog() {
        let origin = MemoryOrigin::with(&[
            ("modules/A/module.txt", r#"{"id": "A", "version": "1.0.0"}"#),
            ("modules/B/module.txt", r#"{"id": "B"}"#),
        ]);
        let sync = IndexSynchronizer::new(origin);
        let report = sync.reparse_all().unwrap();

        assert_eq!(report.parsed, 2);
        let a = sync.get_by_id("A").unwrap();
        let expected =
            ModuleDescriptor::from_slice(br#"{"id": "A", "version": "1.0.0"}"#, "x").unwrap();
        assert_eq!(*a, expected);
        assert!(sync.get_by_id("C").is_none());
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let origin = MemoryOrigin::with(&[
            ("modules/A/module.txt", r#"{"id": "A"}"#),
            ("modules/NoId/module.txt", r#"{"version": "1.0.0"}"#),
            ("modules/Garbage/module.txt", "{{{"),
            ("modules/Z/module.txt", r#"{"id": "Z"}"#),
        ]);
        let sync = IndexSynchronizer::new(origin);
        let report = sync.reparse_all().unwrap();

        assert_eq!(report.parsed, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(sync.get_all().len(), 2);
        assert!(sync.get_by_id("Z").is_some());
    }

    #[test]
    fn duplicate_ids_keep_the_later_entry() {
        let origin = MemoryOrigin::with(&[
            ("modules/A/module.txt", r#"{"id": "Dup", "version": "1"}"#),
            ("modules/B/module.txt", r#"{"id": "Dup", "version": "2"}"#),
        ]);
        let sync = IndexSynchronizer::new(origin);
        let report = sync.reparse_all().unwrap();

        assert_eq!(report.replaced, vec!["Dup".to_string()]);
        assert_eq!(sync.get_all().len(), 1);
        assert_eq!(sync.get_by_id("Dup").unwrap().version.as_deref(), Some("2"));
    }

    #[test]
    fn refresh_twice_is_idempotent() {
        let origin = MemoryOrigin::with(&[
            ("modules/A/module.txt", r#"{"id": "A"}"#),
            ("modules/B/module.txt", r#"{"id": "B"}"#),
        ]);
        let sync = IndexSynchronizer::new(origin);

        sync.refresh().unwrap();
        let first = sync.get_all().sorted();
        sync.refresh().unwrap();
        let second = sync.get_all().sorted();
        assert_eq!(first, second);
    }

    #[test]
    fn conflict_preserves_catalog() {
        let origin = MemoryOrigin::with(&[("modules/A/module.txt", r#"{"id": "A"}"#)]);
        let sync = IndexSynchronizer::new(origin.clone());
        sync.refresh().unwrap();

        origin.set(&[("modules/B/module.txt", r#"{"id": "B"}"#)]);
        origin.conflict.store(true, Ordering::SeqCst);

        match sync.refresh() {
            Err(IndexError::SyncConflict { paths }) => assert_eq!(paths.len(), 1),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(sync.get_by_id("A").is_some());
        assert!(sync.get_by_id("B").is_none());
    }

    #[test]
    fn refresh_replaces_removed_modules() {
        let origin = MemoryOrigin::with(&[("modules/A/module.txt", r#"{"id": "A"}"#)]);
        let sync = IndexSynchronizer::new(origin.clone());
        sync.refresh().unwrap();

        origin.set(&[("modules/B/module.txt", r#"{"id": "B"}"#)]);
        sync.refresh().unwrap();
        assert!(sync.get_by_id("A").is_none());
        assert!(sync.get_by_id("B").is_some());
    }

    #[test]
    fn concurrent_refreshes_serialize() {
        let origin = MemoryOrigin::with(&[("modules/A/module.txt", r#"{"id": "A"}"#)]);
        let sync = Arc::new(IndexSynchronizer::new(origin.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sync = Arc::clone(&sync);
                std::thread::spawn(move || sync.refresh().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(origin.refreshes.load(Ordering::SeqCst), 4);
        assert_eq!(origin.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(sync.get_all().len(), 1);
    }

    #[test]
    fn open_loads_existing_content() {
        let origin = MemoryOrigin::with(&[("modules/A/module.txt", r#"{"id": "A"}"#)]);
        let sync = IndexSynchronizer::open(origin).unwrap();
        assert!(sync.get_by_id("A").is_some());
    }

    #[test]
    fn document_duplicates_keep_the_last_in_document() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.json");
        std::fs::write(
            &index,
            r#"{
                "b-first": {"id": "Dup", "version": "1.0.0"},
                "a-second": {"id": "Dup", "version": "2.0.0"}
            }"#,
        )
        .unwrap();

        let origin =
            DocumentOrigin::new(dir.path().join("mirror"), index.to_string_lossy()).unwrap();
        let sync = IndexSynchronizer::open(origin).unwrap();
        let result = sync.refresh().unwrap();
        assert_eq!(result.report.replaced, vec!["Dup"]);
        assert_eq!(sync.get_by_id("Dup").unwrap().version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn document_origin_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index_mini.json");
        std::fs::write(
            &index,
            r#"{
                "Sample": {"id": "Sample", "version": "0.1.0-SNAPSHOT", "displayName": "Sample"},
                "NoId": {"displayName": "Nameless"},
                "Core": {"id": "Core", "dependencies": ["engine"]}
            }"#,
        )
        .unwrap();

        let origin =
            DocumentOrigin::new(dir.path().join("mirror"), index.to_string_lossy()).unwrap();
        let sync = IndexSynchronizer::open(origin).unwrap();
        assert!(sync.get_all().is_empty());

        let result = sync.refresh().unwrap();
        assert!(result.changed);
        assert_eq!(result.report.parsed, 2);
        assert_eq!(result.report.skipped.len(), 1);
        assert!(sync.get_by_id("Sample").is_some());
        assert_eq!(
            sync.get_by_id("Core").unwrap().dependency_ids(),
            vec!["engine"]
        );

        let mut paths = sync.list_module_descriptor_paths().unwrap();
        paths.sort();
        assert_eq!(paths, vec!["Core", "NoId", "Sample"]);
        assert_eq!(sync.read_descriptor("Sample").unwrap().id, "Sample");
    }
}
