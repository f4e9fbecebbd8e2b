//! In-memory catalog store.
//!
//! Writers take the exclusive lock, so inserts of the same content ID are
//! serialized; searches share the lock and run concurrently.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::{timeout_at, Instant};

use super::{drain_into, CatalogStore, ScanEnd, ScanSink};
use crate::library::error::CatalogError;
use crate::library::record::{ContentId, Record};
use crate::library::search::SearchQuery;

#[derive(Default)]
struct Entries {
    /// Records in insertion order
    records: Vec<Record>,
    /// content_id -> position in `records`
    index: HashMap<ContentId, usize>,
    closed: bool,
}

/// Volatile store used for tests and as a fallback backend
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn closed_error() -> CatalogError {
    CatalogError::StorageUnavailable("memory store is closed".to_string())
}

#[async_trait]
impl CatalogStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, record: &Record, deadline: Instant) -> Result<(), CatalogError> {
        let started = Instant::now();
        let timed_out = || CatalogError::TimedOut {
            operation: "insert",
            after: started.elapsed(),
        };

        let mut entries = timeout_at(deadline, self.entries.write())
            .await
            .map_err(|_| timed_out())?;

        if entries.closed {
            return Err(closed_error());
        }
        if entries.index.contains_key(record.content_id()) {
            return Err(CatalogError::DuplicateContent(record.content_id().clone()));
        }
        if Instant::now() >= deadline {
            return Err(timed_out());
        }

        let position = entries.records.len();
        entries.records.push(record.clone());
        entries.index.insert(record.content_id().clone(), position);

        Ok(())
    }

    async fn scan(&self, query: &SearchQuery, deadline: Instant, sink: ScanSink) -> ScanEnd {
        let matched = match timeout_at(deadline, self.entries.read()).await {
            Ok(entries) if entries.closed => {
                let _ = sink.send(Err(closed_error())).await;
                return ScanEnd::Exhausted;
            }
            Ok(entries) => entries
                .records
                .iter()
                .filter(|record| query.matches(record))
                .cloned()
                .collect::<Vec<_>>(),
            Err(_) => return ScanEnd::DeadlineReached,
        };

        drain_into(matched, deadline, &sink).await
    }

    async fn health_check(&self) -> Result<(), CatalogError> {
        if self.entries.read().await.closed {
            return Err(closed_error());
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), CatalogError> {
        let mut entries = self.entries.write().await;
        entries.closed = true;
        entries.records.clear();
        entries.index.clear();
        Ok(())
    }
}
