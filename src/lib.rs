//! Roadie Metadata Reconciliation Engine Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod aggregator;
pub mod cache;
pub mod catalog_store;
pub mod config;
pub mod images;
pub mod merge;
pub mod normalize;
pub mod providers;
pub mod reconcile;
pub mod resolver;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use merge::{EntityMerger, MergeReport};
pub use reconcile::{FolderReconciler, ReconcileReport};
pub use resolver::{ArtistResolver, LabelResolver, ReleaseResolver, ResolveOutcome};
