//! Storage backends for the catalog.
//!
//! The catalog talks to storage only through [`CatalogStore`], injected at
//! construction. Every call carries the caller's deadline; stores never
//! retry on their own.

pub mod memory;
pub mod sqlite;

use tokio::sync::mpsc;
use tokio::time::Instant;

use async_trait::async_trait;

use super::error::CatalogError;
use super::record::Record;
use super::search::SearchQuery;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Items produced by a scan
pub type ScanSink = mpsc::Sender<Result<Record, CatalogError>>;

/// Why a scan stopped sending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// Every match was sent, or an error was sent in their place
    Exhausted,
    /// The deadline passed before every match was sent
    DeadlineReached,
    /// The reader dropped its end of the sink
    Abandoned,
}

/// Trait for catalog storage backends
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Store a new record
    ///
    /// Either the record is fully stored or nothing changes. Fails with
    /// `DuplicateContent` when the content ID is already present and with
    /// `TimedOut` when the deadline passes before the write is committed.
    async fn insert(&self, record: &Record, deadline: Instant) -> Result<(), CatalogError>;

    /// Send every matching record to `sink` in insertion order
    ///
    /// Stops early when the sink is closed or the deadline passes, and says
    /// which of the two happened.
    async fn scan(&self, query: &SearchQuery, deadline: Instant, sink: ScanSink) -> ScanEnd;

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<(), CatalogError>;

    /// Release the backend; later calls report `StorageUnavailable`
    async fn close(&self) -> Result<(), CatalogError>;
}

/// Forward already-matched records to the sink, honoring the deadline
pub(crate) async fn drain_into(
    records: Vec<Record>,
    deadline: Instant,
    sink: &ScanSink,
) -> ScanEnd {
    for record in records {
        if Instant::now() >= deadline {
            return ScanEnd::DeadlineReached;
        }
        if sink.send(Ok(record)).await.is_err() {
            return ScanEnd::Abandoned;
        }
    }
    ScanEnd::Exhausted
}
