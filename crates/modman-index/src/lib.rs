//! Module index mirroring and catalog for modman.
//!
//! Keeps a local mirror of a remote module index and exposes the parsed
//! module descriptors as an in-memory catalog keyed by module id.
//!
//! ## Modules
//!
//! - [`origin`]: Index sources: git tree mirror and flat JSON document
//! - [`descriptor`]: Module descriptor schema and parsing
//! - [`catalog`]: Thread-safe id → descriptor catalog with atomic rebuilds
//! - [`sync`]: Synchronizer tying an origin to its catalog

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod origin;
pub mod sync;

pub use catalog::{CatalogBuilder, CatalogSnapshot, ModuleCatalog, ParseReport, SkippedEntry};
pub use descriptor::{DependencyInfo, DependencySpec, LocalizedText, ModuleDescriptor};
pub use error::{IndexError, Result};
pub use origin::{
    DocumentFetcher, DocumentOrigin, GitBackend, GitCli, HttpDocumentFetcher, IndexOrigin,
    RefreshOutcome, TreeOrigin,
};
pub use sync::{IndexSynchronizer, SyncReport};
