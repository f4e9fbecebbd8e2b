//! cinebot - channel-indexed movie and anime catalog
//!
//! Files posted to an archive channel are indexed from their captions and
//! can be searched by title or tag through a Telegram bot.
//!
//! # Architecture
//!
//! - The extractor parses a caption into title, tags and quality
//! - The catalog stores records behind an injected storage backend
//! - The bot routes chat updates to the catalog and renders results
//!
//! # Modules
//!
//! - `library`: Extraction, records, search and storage
//! - `adapters`: Chat transport (Telegram Bot API)
//! - `bot`: Update dispatch, menus and result rendering
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the bot
//! BOT_TOKEN=... CHANNEL_ID=-100... cinebot serve
//!
//! # Index a caption by hand and search for it
//! printf '#movie Heat\nQuality: 720p' | cinebot index --content-id 42
//! cinebot search heat
//! ```

pub mod adapters;
pub mod bot;
pub mod cli;
pub mod config;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{ChatTransport, TelegramClient};
pub use bot::{Bot, BotSettings};
pub use library::{
    Catalog, CatalogError, CatalogStore, ContentId, InsertRequest, MemoryStore, Record,
    RecordStream, SqliteStore,
};
