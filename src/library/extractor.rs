//! Caption parsing.
//!
//! Turns a free-text caption (or a file name) into title, tags and quality.
//! Extraction never fails: malformed input at worst yields an empty title
//! and no tags.
//!
//! ```text
//! #Action Movie Title        title   = "Movie Title"
//! Quality: 720p              tags    = ["#action"]
//!                            quality = "720p"
//! ```

use std::collections::HashSet;
use std::path::Path;

use super::record::NOT_AVAILABLE;

/// Character that starts a tag token
pub const TAG_MARKER: char = '#';

/// Line label carrying the quality value
pub const QUALITY_LABEL: &str = "Quality";

/// Fields derived from a caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub tags: Vec<String>,
    pub quality: String,
    pub size_bytes: Option<u64>,
}

/// Extract all fields from a caption
pub fn extract(raw_text: &str, size_bytes: Option<u64>) -> Extracted {
    Extracted {
        title: extract_title(raw_text),
        tags: extract_tags(raw_text),
        quality: extract_quality(raw_text).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        size_bytes,
    }
}

fn is_tag_token(token: &str) -> bool {
    token.starts_with(TAG_MARKER)
}

/// Lowercased `#word` tokens from the whole text, first-seen order, no duplicates
pub fn extract_tags(raw_text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for token in raw_text.split_whitespace() {
        // A lone marker carries no tag name
        if !is_tag_token(token) || token.len() == TAG_MARKER.len_utf8() {
            continue;
        }

        let tag = token.to_lowercase();
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    tags
}

/// Non-tag tokens of the first line joined with single spaces
pub fn extract_title(raw_text: &str) -> String {
    raw_text
        .lines()
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .filter(|token| !is_tag_token(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value of the first `Quality: <value>` line with a non-empty value
pub fn extract_quality(raw_text: &str) -> Option<String> {
    raw_text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key != QUALITY_LABEL {
            return None;
        }

        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Raw text for a file event: the caption, or the file name stem without one
pub fn caption_or_file_name(caption: Option<&str>, file_name: Option<&str>) -> String {
    match caption {
        Some(caption) if !caption.trim().is_empty() => caption.to_string(),
        _ => file_name
            .map(|name| {
                Path::new(name)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| name.to_string())
            })
            .unwrap_or_default(),
    }
}
