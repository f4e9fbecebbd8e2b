//! Catalog of indexed files.
//!
//! Wraps an injected [`CatalogStore`] with deadline handling, request
//! validation and the lazy result stream handed to the presentation layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use super::error::CatalogError;
use super::record::{InsertRequest, Record};
use super::search::SearchQuery;
use super::store::{CatalogStore, ScanEnd};

/// Default cap on raw caption size accepted by `ingest`
pub const DEFAULT_MAX_TEXT_BYTES: usize = 4096;

/// Buffered results between a running scan and its reader
const STREAM_BUFFER: usize = 32;

/// Shared handle to the catalog
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    max_text_bytes: usize,
}

impl Catalog {
    /// Create a catalog over an opened store
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
        }
    }

    /// Set the largest caption `ingest` accepts
    pub fn with_max_text_bytes(mut self, max_text_bytes: usize) -> Self {
        self.max_text_bytes = max_text_bytes;
        self
    }

    /// Largest caption `ingest` accepts
    pub fn max_text_bytes(&self) -> usize {
        self.max_text_bytes
    }

    /// Name of the backing store
    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// Store a record; visible to queries once this returns `Ok`
    #[instrument(skip(self, record), fields(content_id = %record.content_id()))]
    pub async fn insert(&self, record: Record, timeout: Duration) -> Result<(), CatalogError> {
        let deadline = Instant::now() + timeout;

        match self.store.insert(&record, deadline).await {
            Ok(()) => {
                debug!(title = record.title(), tags = ?record.tags(), "Record indexed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Insert failed");
                Err(e)
            }
        }
    }

    /// Validate a file event, extract its metadata and store the result
    pub async fn ingest(
        &self,
        request: InsertRequest,
        timeout: Duration,
    ) -> Result<Record, CatalogError> {
        let record = request.into_record(self.max_text_bytes)?;
        self.insert(record.clone(), timeout).await?;

        info!(
            content_id = %record.content_id(),
            title = record.title(),
            "Indexed file"
        );
        Ok(record)
    }

    /// Search by title substring or exact tag
    ///
    /// The returned stream is one-shot; querying again re-runs the match.
    /// Blank text yields an empty stream without touching storage. Must be
    /// called from within a Tokio runtime.
    pub fn query(&self, text: &str, timeout: Duration) -> RecordStream {
        let deadline = Instant::now() + timeout;

        let Some(query) = SearchQuery::parse(text) else {
            debug!("Blank search text, returning no results");
            return RecordStream::empty(deadline);
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let store = Arc::clone(&self.store);
        let scan_hit_deadline = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&scan_hit_deadline);

        tokio::spawn(async move {
            // Held until the flag is set, so the reader sees the channel
            // close only after the outcome is known
            let keep_open = tx.clone();
            if store.scan(&query, deadline, tx).await == ScanEnd::DeadlineReached {
                flag.store(true, Ordering::Release);
            }
            drop(keep_open);
        });

        RecordStream::new(rx, deadline, scan_hit_deadline)
    }

    /// Check that the store is reachable
    pub async fn health_check(&self) -> Result<(), CatalogError> {
        self.store.health_check().await
    }

    /// Release the store at shutdown
    pub async fn close(&self) -> Result<(), CatalogError> {
        info!(backend = self.store.name(), "Closing catalog");
        self.store.close().await
    }
}

/// One-shot sequence of query results in insertion order
///
/// Dropping the stream stops the underlying scan.
pub struct RecordStream {
    rx: Option<mpsc::Receiver<Result<Record, CatalogError>>>,
    deadline: Instant,
    /// Set by the scan task when the store stopped at the deadline
    scan_hit_deadline: Arc<AtomicBool>,
    cut_short: bool,
}

impl RecordStream {
    fn new(
        rx: mpsc::Receiver<Result<Record, CatalogError>>,
        deadline: Instant,
        scan_hit_deadline: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx: Some(rx),
            deadline,
            scan_hit_deadline,
            cut_short: false,
        }
    }

    fn empty(deadline: Instant) -> Self {
        Self {
            rx: None,
            deadline,
            scan_hit_deadline: Arc::new(AtomicBool::new(false)),
            cut_short: false,
        }
    }

    /// Next matching record, or `None` once the results are exhausted
    pub async fn next_record(&mut self) -> Option<Result<Record, CatalogError>> {
        let rx = self.rx.as_mut()?;

        match timeout_at(self.deadline, rx.recv()).await {
            Ok(Some(item)) => Some(item),
            Ok(None) => {
                if self.scan_hit_deadline.load(Ordering::Acquire) {
                    debug!("Scan stopped at the query deadline");
                    self.cut_short = true;
                }
                self.rx = None;
                None
            }
            Err(_) => {
                debug!("Query deadline reached, ending results");
                self.cut_short = true;
                self.rx = None;
                None
            }
        }
    }

    /// Whether the deadline ended the stream before all results arrived
    pub fn was_cut_short(&self) -> bool {
        self.cut_short
    }

    /// Collect the remaining records, stopping at the first error
    pub async fn try_collect(mut self) -> Result<Vec<Record>, CatalogError> {
        let mut records = Vec::new();
        while let Some(item) = self.next_record().await {
            records.push(item?);
        }
        Ok(records)
    }
}
