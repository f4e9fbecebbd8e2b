//! Adapter interfaces for external systems.
//!
//! The bot talks to its chat platform through [`ChatTransport`], so the
//! dispatch logic can run against Telegram or a test double.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

pub use telegram::{InlineButton, InlineKeyboard, TelegramClient};

/// Outbound chat operations used by the bot
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message, returning its message ID
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64>;

    /// Replace the text and keyboard of an existing message
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()>;

    /// Acknowledge a button press
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()>;

    /// Copy a message into another chat, returning the new message ID
    async fn copy_message(&self, to_chat: &str, from_chat: i64, message_id: i64) -> Result<i64>;
}
