//! Search query construction and matching policy.

use super::record::Record;

/// A normalized search query
///
/// A record matches when its title contains the query text (ignoring case)
/// or when one of its tags equals the lowercased query exactly. The two
/// checks are independent and a record is reported once either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    needle: String,
}

impl SearchQuery {
    /// Build a query from free text
    ///
    /// Returns `None` when the text is empty after trimming; such queries
    /// match nothing rather than the whole catalog.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    /// Lowercased query text
    pub fn text(&self) -> &str {
        &self.needle
    }

    pub fn matches_title(&self, record: &Record) -> bool {
        record.title().to_lowercase().contains(&self.needle)
    }

    pub fn matches_tag(&self, record: &Record) -> bool {
        record.has_tag(&self.needle)
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.matches_title(record) || self.matches_tag(record)
    }
}
