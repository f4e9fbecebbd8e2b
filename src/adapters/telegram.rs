//! Telegram Bot API adapter.
//!
//! Long-polls for updates and sends menus and search results back. Only the
//! handful of Bot API methods the catalog bot needs are wrapped here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ChatTransport;

/// Telegram Bot API client
pub struct TelegramClient {
    /// Bot token
    bot_token: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response envelope from the Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage/copyMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// Incoming update from getUpdates
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub video: Option<FileInfo>,
    #[serde(default)]
    pub document: Option<FileInfo>,
}

impl Message {
    /// Attached video, or document when there is no video
    pub fn media(&self) -> Option<&FileInfo> {
        self.video.as_ref().or(self.document.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
}

/// Video or document attachment
#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Inline keyboard markup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// One button per row
    pub fn single_column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.inline_keyboard.iter().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

impl TelegramClient {
    /// Create a new Telegram client
    pub fn new(bot_token: String, poll_timeout_secs: u64) -> Result<Self> {
        // Leave headroom over the long-poll wait
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { bot_token, client })
    }

    /// Build API URL
    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// POST a JSON body and unwrap the response envelope
    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram {}", method))?;

        let result: TelegramResponse<T> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        result
            .result
            .with_context(|| format!("Telegram {} returned no result", method))
    }

    /// Fetch updates after `offset`, waiting up to `timeout_secs`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "channel_post", "callback_query"],
            }),
        )
        .await
    }
}

fn with_keyboard(
    mut body: serde_json::Value,
    keyboard: Option<&InlineKeyboard>,
) -> Result<serde_json::Value> {
    if let Some(keyboard) = keyboard {
        body["reply_markup"] = serde_json::to_value(keyboard)?;
    }
    Ok(body)
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64> {
        let body = with_keyboard(
            serde_json::json!({ "chat_id": chat_id, "text": text }),
            keyboard,
        )?;
        let sent: MessageResult = self.call("sendMessage", body).await?;
        Ok(sent.message_id)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        let body = with_keyboard(
            serde_json::json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
            }),
            keyboard,
        )?;
        // Result is the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                serde_json::json!({ "callback_query_id": callback_query_id }),
            )
            .await?;
        Ok(())
    }

    async fn copy_message(&self, to_chat: &str, from_chat: i64, message_id: i64) -> Result<i64> {
        let copied: MessageResult = self
            .call(
                "copyMessage",
                serde_json::json!({
                    "chat_id": to_chat,
                    "from_chat_id": from_chat,
                    "message_id": message_id,
                }),
            )
            .await?;
        Ok(copied.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = TelegramClient::new("TOKEN".to_string(), 30).unwrap();
        assert_eq!(
            client.api_url("sendMessage"),
            "https://api.telegram.org/botTOKEN/sendMessage"
        );
    }

    #[test]
    fn test_parse_channel_post_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "channel_post": {
                "message_id": 77,
                "chat": { "id": -1001234567890i64, "type": "channel" },
                "caption": "#movie Heat",
                "video": { "file_id": "abc", "file_size": 1024 }
            }
        }))
        .unwrap();

        let post = update.channel_post.unwrap();
        assert_eq!(post.message_id, 77);
        assert!(!post.chat.is_private());
        assert_eq!(post.media().unwrap().file_size, Some(1024));
        assert!(update.message.is_none());
    }

    #[test]
    fn test_media_prefers_video() {
        let message: Message = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "chat": { "id": 5, "type": "private" },
            "video": { "file_id": "v" },
            "document": { "file_id": "d" }
        }))
        .unwrap();
        assert_eq!(message.media().unwrap().file_id, "v");
    }

    #[test]
    fn test_keyboard_serialization_skips_empty_fields() {
        let keyboard = InlineKeyboard::single_column([
            InlineButton::callback("Back", "main_menu"),
            InlineButton::link("Download", "https://t.me/c/1/2"),
        ]);
        let value = serde_json::to_value(&keyboard).unwrap();

        assert_eq!(value["inline_keyboard"][0][0]["callback_data"], "main_menu");
        assert!(value["inline_keyboard"][0][0].get("url").is_none());
        assert_eq!(value["inline_keyboard"][1][0]["url"], "https://t.me/c/1/2");
    }

    #[test]
    fn test_with_keyboard_adds_markup() {
        let keyboard = InlineKeyboard::single_column([InlineButton::callback("A", "a")]);
        let body = with_keyboard(serde_json::json!({ "text": "hi" }), Some(&keyboard)).unwrap();
        assert!(body.get("reply_markup").is_some());

        let plain = with_keyboard(serde_json::json!({ "text": "hi" }), None).unwrap();
        assert!(plain.get("reply_markup").is_none());
    }
}
