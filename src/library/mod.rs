//! File indexing and search.
//!
//! Channel posts and uploads arrive as [`InsertRequest`]s. The extractor
//! turns their caption into a [`Record`], which the [`Catalog`] stores and
//! later returns from searches.
//!
//! ```text
//! file event → extractor → Catalog::insert → CatalogStore (SQLite / memory)
//! search text → Catalog::query → RecordStream → presentation layer
//! ```

pub mod catalog;
pub mod error;
pub mod extractor;
pub mod record;
pub mod search;
pub mod store;

pub use catalog::{Catalog, RecordStream};
pub use error::CatalogError;
pub use extractor::{extract, Extracted};
pub use record::{ContentId, InsertRequest, Record, NOT_AVAILABLE};
pub use search::SearchQuery;
pub use store::{CatalogStore, MemoryStore, ScanEnd, SqliteStore};
