//! In-memory module catalog.
//!
//! The catalog maps module ids to the latest descriptor seen. It is rebuilt
//! wholesale on every index refresh: a [`CatalogBuilder`] accumulates a new
//! generation and [`ModuleCatalog::replace`] swaps it in atomically, so
//! readers never observe a half-populated catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::descriptor::ModuleDescriptor;
use crate::error::IndexError;

type Entries = HashMap<String, Arc<ModuleDescriptor>>;

/// Thread-safe mapping from module id to descriptor.
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    entries: RwLock<Arc<Entries>>,
}

/// An immutable view of the catalog at one point in time.
///
/// Later refreshes do not affect a snapshot that has already been taken.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    entries: Arc<Entries>,
}

impl CatalogSnapshot {
    /// Number of modules in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a module by id.
    pub fn get(&self, id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.entries.get(id)
    }

    /// Iterate over all descriptors (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.entries.values()
    }

    /// All descriptors sorted by id.
    pub fn sorted(&self) -> Vec<Arc<ModuleDescriptor>> {
        let mut all: Vec<_> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all current descriptors.
    pub fn get_all(&self) -> CatalogSnapshot {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        CatalogSnapshot {
            entries: Arc::clone(&entries),
        }
    }

    /// Look up a single descriptor by id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<ModuleDescriptor>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Number of modules currently catalogued.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive substring search over ids and display names.
    pub fn search(&self, query: &str) -> Vec<Arc<ModuleDescriptor>> {
        let query = query.to_lowercase();
        let mut hits: Vec<_> = self
            .get_all()
            .iter()
            .filter(|d| {
                d.id.to_lowercase().contains(&query) || d.name().to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.id.cmp(&b.id));
        hits
    }

    /// Atomically replace the catalog contents with a new generation.
    pub fn replace(&self, builder: CatalogBuilder) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *entries = Arc::new(builder.entries);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.replace(CatalogBuilder::new());
    }
}

/// An entry that was skipped during a bulk parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Origin entry name (path or document key).
    pub entry: String,
    /// Why the entry was skipped.
    pub reason: String,
}

/// Outcome of a bulk parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Number of descriptors parsed successfully.
    pub parsed: usize,
    /// Entries that failed to parse.
    pub skipped: Vec<SkippedEntry>,
    /// Ids that were seen more than once (last one won).
    pub replaced: Vec<String>,
}

/// Accumulates one catalog generation plus its [`ParseReport`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: Entries,
    report: ParseReport,
}

impl CatalogBuilder {
    /// Start an empty generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, replacing any earlier one with the same id.
    pub fn insert(mut self, descriptor: ModuleDescriptor) -> Self {
        let id = descriptor.id.clone();
        tracing::info!(id = %id, "Found module info");
        tracing::debug!(details = ?descriptor, "Module details");

        if self.entries.insert(id.clone(), Arc::new(descriptor)).is_some() {
            tracing::warn!(id = %id, "Module id already present in catalog - overwriting");
            self.report.replaced.push(id);
        }
        self.report.parsed += 1;
        self
    }

    /// Record an entry that could not be parsed.
    pub fn skip(mut self, entry: &str, error: &IndexError) -> Self {
        match error {
            IndexError::MissingId { .. } => {
                tracing::warn!(entry = %entry, "Encountered module info without id field");
            }
            other => {
                tracing::warn!(entry = %entry, error = %other, "Encountered invalid module info");
            }
        }
        self.report.skipped.push(SkippedEntry {
            entry: entry.to_string(),
            reason: error.to_string(),
        });
        self
    }

    /// The report accumulated so far.
    pub fn report(&self) -> &ParseReport {
        &self.report
    }

    /// Number of distinct ids in this generation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no descriptor has been inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commit this generation to `catalog`, returning the report.
    pub fn commit(self, catalog: &ModuleCatalog) -> ParseReport {
        let report = self.report.clone();
        catalog.replace(self);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, version: &str) -> ModuleDescriptor {
        let json = format!(r#"{{"id": "{id}", "version": "{version}"}}"#);
        ModuleDescriptor::from_slice(json.as_bytes(), id).unwrap()
    }

    #[test]
    fn get_by_id_returns_inserted() {
        let catalog = ModuleCatalog::new();
        let report = CatalogBuilder::new()
            .insert(descriptor("Sample", "1.0.0"))
            .commit(&catalog);

        assert_eq!(report.parsed, 1);
        let found = catalog.get_by_id("Sample").unwrap();
        assert_eq!(*found, descriptor("Sample", "1.0.0"));
        assert!(catalog.get_by_id("Missing").is_none());
    }

    #[test]
    fn later_insert_replaces_earlier() {
        let builder = CatalogBuilder::new()
            .insert(descriptor("Dup", "1.0.0"))
            .insert(descriptor("Dup", "2.0.0"));
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.report().replaced, vec!["Dup".to_string()]);

        let catalog = ModuleCatalog::new();
        builder.commit(&catalog);
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get_by_id("Dup").unwrap().version.as_deref(),
            Some("2.0.0")
        );
    }

    #[test]
    fn replace_is_wholesale() {
        let catalog = ModuleCatalog::new();
        CatalogBuilder::new()
            .insert(descriptor("Old", "1.0.0"))
            .commit(&catalog);
        CatalogBuilder::new()
            .insert(descriptor("New", "1.0.0"))
            .commit(&catalog);

        assert!(catalog.get_by_id("Old").is_none());
        assert!(catalog.get_by_id("New").is_some());
    }

    #[test]
    fn snapshot_survives_replacement() {
        let catalog = ModuleCatalog::new();
        CatalogBuilder::new()
            .insert(descriptor("A", "1.0.0"))
            .commit(&catalog);

        let snapshot = catalog.get_all();
        catalog.clear();

        assert!(catalog.is_empty());
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("A").is_some());
    }

    #[test]
    fn skipped_entries_are_reported() {
        let err = IndexError::MissingId {
            source_name: "modules/X/module.txt".to_string(),
        };
        let builder = CatalogBuilder::new()
            .skip("modules/X/module.txt", &err)
            .insert(descriptor("Y", "1.0.0"));

        let report = builder.report();
        assert_eq!(report.parsed, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].entry, "modules/X/module.txt");
    }

    #[test]
    fn search_matches_id_and_name() {
        let catalog = ModuleCatalog::new();
        let named = ModuleDescriptor::from_slice(
            br#"{"id": "CopperAndBronze", "displayName": "Copper and Bronze"}"#,
            "cab",
        )
        .unwrap();
        CatalogBuilder::new()
            .insert(named)
            .insert(descriptor("Sample", "1.0.0"))
            .commit(&catalog);

        let hits = catalog.search("bronze");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "CopperAndBronze");
        assert_eq!(catalog.search("").len(), 2);
    }

    #[test]
    fn sorted_snapshot() {
        let catalog = ModuleCatalog::new();
        CatalogBuilder::new()
            .insert(descriptor("b", "1"))
            .insert(descriptor("a", "1"))
            .commit(&catalog);
        let ids: Vec<_> = catalog
            .get_all()
            .sorted()
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
