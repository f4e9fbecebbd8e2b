//! User-facing text for search results.

use crate::adapters::{InlineButton, InlineKeyboard};
use crate::library::{Record, NOT_AVAILABLE};

/// Tags that mark the content kind rather than a genre
const KIND_TAGS: &[&str] = &["#movie", "#anime"];

pub const WELCOME: &str = "🎬 Welcome to Cinema Bot!\n\n\
    Browse our collection of Movies and Anime Series.\n\
    Select an option below:";

pub const SEARCH_USAGE: &str = "Usage: /search <title or #tag>";

pub fn no_results(query: &str) -> String {
    format!("😔 No results found for: {}", query)
}

pub fn upload_accepted(record: &Record) -> String {
    let title = if record.title().is_empty() {
        "(untitled)"
    } else {
        record.title()
    };
    format!("✅ Added to the catalog: {}", title)
}

pub fn upload_rejected(reason: &str) -> String {
    format!("⚠️ Could not add this file: {}", reason)
}

/// The copy in the archive channel exists but has no catalog entry
pub fn upload_not_indexed(reason: &str) -> String {
    format!(
        "⚠️ Your file was archived but could not be added to the catalog: {}",
        reason
    )
}

pub fn search_timed_out(query: &str) -> String {
    format!("⌛ Searching for {} took too long. Please try again.", query)
}

/// Result card text
pub fn result_card(record: &Record) -> String {
    let kind = if record.has_tag("#movie") {
        "🎬 Movie"
    } else {
        "📺 Anime"
    };

    let genres: Vec<&str> = record
        .tags()
        .iter()
        .map(String::as_str)
        .filter(|tag| !KIND_TAGS.contains(tag))
        .collect();

    format!(
        "{}: {}\nQuality: {}\nSize: {}\nGenre: {}",
        kind,
        record.title(),
        record.quality(),
        record
            .size_bytes()
            .map(human_size)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        genres.join(", ")
    )
}

/// Keyboard with a download link into the archive channel
pub fn download_keyboard(channel_id: &str, record: &Record) -> InlineKeyboard {
    InlineKeyboard::single_column([InlineButton::link(
        "⬇️ Download",
        message_link(channel_id, record.content_id().as_str()),
    )])
}

/// `t.me/c` link to a message in a private channel
///
/// Channel IDs carry a `-100` prefix that the link format drops.
pub fn message_link(channel_id: &str, message_id: &str) -> String {
    let trimmed = channel_id.trim().trim_start_matches('-');
    let internal = trimmed.strip_prefix("100").unwrap_or(trimmed);
    format!("https://t.me/c/{}/{}", internal, message_id)
}

/// Byte count in binary units with one decimal
pub fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
