//! Indexed file records.
//!
//! A record is built once from a single extraction pass and never changes
//! afterwards. Deleting records is an administrative task outside the bot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CatalogError;
use super::extractor::{self, Extracted};

/// Sentinel shown for missing quality or size
pub const NOT_AVAILABLE: &str = "N/A";

/// Identifier of the source message the file was posted in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Parse a content ID, rejecting blank values
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::Validation(
                "content_id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

/// One indexed file's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    content_id: ContentId,
    title: String,
    tags: Vec<String>,
    quality: String,
    size_bytes: Option<u64>,
    owner_id: Option<String>,
    indexed_at: DateTime<Utc>,
}

impl Record {
    /// Build a record from an extraction result
    pub fn new(content_id: ContentId, extracted: Extracted, owner_id: Option<String>) -> Self {
        Self {
            content_id,
            title: extracted.title,
            tags: extracted.tags,
            quality: extracted.quality,
            size_bytes: extracted.size_bytes,
            owner_id,
            indexed_at: Utc::now(),
        }
    }

    /// Reassemble a record read back from storage
    pub(crate) fn from_parts(
        content_id: ContentId,
        title: String,
        tags: Vec<String>,
        quality: String,
        size_bytes: Option<u64>,
        owner_id: Option<String>,
        indexed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content_id,
            title,
            tags,
            quality,
            size_bytes,
            owner_id,
            indexed_at,
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Tags in first-seen order, lowercase, marker included
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Quality label, `"N/A"` when the caption had none
    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    /// Size in bytes as text, `"N/A"` when unknown
    pub fn size_label(&self) -> String {
        self.size_bytes
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Uploader, present only for user-submitted files
    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn indexed_at(&self) -> DateTime<Utc> {
        self.indexed_at
    }
}

/// Inbound file event from the transport layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    pub content_id: String,
    pub raw_text: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl InsertRequest {
    pub fn new(content_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            raw_text: raw_text.into(),
            size_bytes: None,
            owner_id: None,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Check the request and turn it into a record
    pub fn into_record(self, max_text_bytes: usize) -> Result<Record, CatalogError> {
        let content_id = ContentId::parse(&self.content_id)?;

        let owner_id = match self.owner_id {
            Some(owner) if owner.trim().is_empty() => {
                return Err(CatalogError::Validation(
                    "owner_id must not be blank when present".to_string(),
                ));
            }
            Some(owner) => Some(owner.trim().to_string()),
            None => None,
        };

        if self.raw_text.len() > max_text_bytes {
            return Err(CatalogError::Validation(format!(
                "raw_text is {} bytes, limit is {}",
                self.raw_text.len(),
                max_text_bytes
            )));
        }

        let extracted = extractor::extract(&self.raw_text, self.size_bytes);
        Ok(Record::new(content_id, extracted, owner_id))
    }
}
