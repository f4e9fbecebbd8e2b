//! Errors surfaced by the catalog.

use std::time::Duration;

use thiserror::Error;

use super::record::ContentId;

/// Errors that can occur while indexing or searching the catalog
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Malformed insert request, rejected before reaching storage
    #[error("Invalid insert request: {0}")]
    Validation(String),

    /// A record with this content ID is already indexed
    #[error("Content already indexed: {0}")]
    DuplicateContent(ContentId),

    /// Backing store unreachable or failing
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The caller-supplied deadline passed before the operation finished
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        after: Duration,
    },
}

impl CatalogError {
    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(format!("{}: {}", context, err))
    }

    /// Whether the failure came from the storage layer
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}
