//! Bot Dispatch Integration Tests
//!
//! Drives the update handler with a recording transport in place of the
//! Telegram API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use cinebot::adapters::telegram::Update;
use cinebot::adapters::{ChatTransport, InlineKeyboard};
use cinebot::bot::{Bot, BotSettings};
use cinebot::config::Limits;
use cinebot::library::{Catalog, InsertRequest, MemoryStore};

const CHANNEL: &str = "-1001234567890";
const USER: i64 = 4242;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Send {
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edit {
        message_id: i64,
        text: String,
    },
    Answer(String),
    Copy {
        to_chat: String,
        message_id: i64,
    },
}

/// Records every outbound call; copied messages get IDs from 900 up
#[derive(Default)]
struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
}

impl RecordingTransport {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<i64> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Send {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(calls.len() as i64)
    }

    async fn edit_message_text(
        &self,
        _chat_id: i64,
        message_id: i64,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Edit {
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Answer(callback_query_id.to_string()));
        Ok(())
    }

    async fn copy_message(&self, to_chat: &str, _from_chat: i64, message_id: i64) -> Result<i64> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call::Copy {
            to_chat: to_chat.to_string(),
            message_id,
        });
        Ok(900 + calls.len() as i64)
    }
}

fn setup() -> (Bot<RecordingTransport>, Arc<RecordingTransport>) {
    setup_with_limits(&Limits::default())
}

fn setup_with_limits(limits: &Limits) -> (Bot<RecordingTransport>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let catalog = Catalog::new(Arc::new(MemoryStore::new()));
    let settings = BotSettings::new(CHANNEL, limits);
    (Bot::new(Arc::clone(&transport), catalog, settings), transport)
}

fn private_upload(message_id: i64, caption: &str) -> Update {
    update(json!({
        "update_id": message_id,
        "message": {
            "message_id": message_id,
            "chat": { "id": USER, "type": "private" },
            "from": { "id": USER, "first_name": "Ana" },
            "caption": caption,
            "video": { "file_id": "vid" }
        }
    }))
}

fn update(value: serde_json::Value) -> Update {
    serde_json::from_value(value).unwrap()
}

fn channel_post(message_id: i64, caption: &str) -> Update {
    update(json!({
        "update_id": message_id,
        "channel_post": {
            "message_id": message_id,
            "chat": { "id": -1001234567890i64, "type": "channel" },
            "caption": caption,
            "video": { "file_id": "vid", "file_size": 734003200u64 }
        }
    }))
}

fn private_text(text: &str) -> Update {
    update(json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "chat": { "id": USER, "type": "private" },
            "from": { "id": USER, "first_name": "Ana" },
            "text": text
        }
    }))
}

fn callback(data: &str) -> Update {
    update(json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb-1",
            "from": { "id": USER, "first_name": "Ana" },
            "data": data,
            "message": {
                "message_id": 77,
                "chat": { "id": USER, "type": "private" }
            }
        }
    }))
}

#[tokio::test]
async fn test_channel_post_is_indexed() {
    let (bot, _) = setup();

    bot.handle_update(&channel_post(55, "#movie #horror The Conjuring\nQuality: 1080p"))
        .await
        .unwrap();

    let results = bot
        .catalog()
        .query("#horror", Duration::from_secs(5))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content_id().as_str(), "55");
    assert_eq!(results[0].size_bytes(), Some(734_003_200));
}

#[tokio::test]
async fn test_redelivered_channel_post_is_ignored() {
    let (bot, _) = setup();
    let post = channel_post(55, "#movie Heat");

    bot.handle_update(&post).await.unwrap();
    bot.handle_update(&post).await.unwrap();
}

#[tokio::test]
async fn test_post_from_other_channel_is_skipped() {
    let (bot, _) = setup();
    let post = update(json!({
        "update_id": 3,
        "channel_post": {
            "message_id": 8,
            "chat": { "id": -100999, "type": "channel" },
            "caption": "#movie Heat",
            "video": { "file_id": "vid" }
        }
    }));

    bot.handle_update(&post).await.unwrap();

    let results = bot
        .catalog()
        .query("heat", Duration::from_secs(5))
        .try_collect()
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_start_sends_menu() {
    let (bot, transport) = setup();

    bot.handle_update(&private_text("/start")).await.unwrap();

    match transport.calls().as_slice() {
        [Call::Send {
            chat_id,
            text,
            keyboard: Some(keyboard),
        }] => {
            assert_eq!(*chat_id, USER);
            assert!(text.contains("Welcome"));
            assert!(keyboard.buttons().count() > 0);
        }
        other => panic!("unexpected calls: {:?}", other),
    }
}

#[tokio::test]
async fn test_search_sends_card_with_download_link() {
    let (bot, transport) = setup();
    bot.handle_update(&channel_post(55, "#anime #action Naruto\nQuality: 720p"))
        .await
        .unwrap();

    bot.handle_update(&private_text("/search naruto")).await.unwrap();

    let calls = transport.calls();
    let Some(Call::Send {
        text,
        keyboard: Some(keyboard),
        ..
    }) = calls.last()
    else {
        panic!("expected a result card, got {:?}", calls);
    };
    assert!(text.contains("Naruto"));
    assert!(text.contains("Quality: 720p"));
    assert!(text.contains("700.0 MB"));

    let url = keyboard.buttons().find_map(|b| b.url.clone()).unwrap();
    assert_eq!(url, "https://t.me/c/1234567890/55");
}

#[tokio::test]
async fn test_search_without_matches() {
    let (bot, transport) = setup();

    bot.handle_update(&private_text("/search nothing here"))
        .await
        .unwrap();

    assert_eq!(
        transport.sent_texts(),
        vec!["😔 No results found for: nothing here".to_string()]
    );
}

#[tokio::test]
async fn test_search_past_deadline_is_not_reported_as_empty() {
    let limits = Limits {
        query_timeout: Duration::ZERO,
        ..Limits::default()
    };
    let (bot, transport) = setup_with_limits(&limits);
    bot.handle_update(&channel_post(55, "#movie Heat")).await.unwrap();

    bot.handle_update(&private_text("/search heat")).await.unwrap();

    let texts = transport.sent_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("⌛"), "{}", texts[0]);
    assert!(!texts[0].contains("No results"));
}

#[tokio::test]
async fn test_search_without_text_shows_usage() {
    let (bot, transport) = setup();

    bot.handle_update(&private_text("/search")).await.unwrap();

    assert_eq!(transport.sent_texts().len(), 1);
    assert!(transport.sent_texts()[0].starts_with("Usage:"));
}

#[tokio::test]
async fn test_search_caps_results() {
    let (bot, transport) = setup();
    for i in 0..15 {
        bot.catalog()
            .ingest(
                InsertRequest::new(i.to_string(), format!("#movie Saw {}", i)),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
    }

    bot.handle_update(&private_text("/search saw")).await.unwrap();

    assert_eq!(transport.sent_texts().len(), Limits::default().max_results);
}

#[tokio::test]
async fn test_menu_button_edits_in_place() {
    let (bot, transport) = setup();

    bot.handle_update(&callback("movies")).await.unwrap();

    let calls = transport.calls();
    assert_eq!(calls[0], Call::Answer("cb-1".to_string()));
    match &calls[1] {
        Call::Edit { message_id, text } => {
            assert_eq!(*message_id, 77);
            assert!(text.contains("Movies"));
        }
        other => panic!("expected an edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_category_button_searches_tag() {
    let (bot, transport) = setup();
    bot.handle_update(&channel_post(55, "#movie #horror The Conjuring"))
        .await
        .unwrap();
    bot.handle_update(&channel_post(56, "#movie #comedy Horrible Bosses"))
        .await
        .unwrap();

    bot.handle_update(&callback("cat_horror")).await.unwrap();

    let texts = transport.sent_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("The Conjuring"));
}

#[tokio::test]
async fn test_private_upload_is_archived_with_owner() {
    let (bot, transport) = setup();
    let upload = update(json!({
        "update_id": 4,
        "message": {
            "message_id": 31,
            "chat": { "id": USER, "type": "private" },
            "from": { "id": USER, "first_name": "Ana" },
            "caption": "#anime Frieren\nQuality: 1080p",
            "document": { "file_id": "doc", "file_name": "frieren.mkv", "file_size": 1024u64 }
        }
    }));

    bot.handle_update(&upload).await.unwrap();

    let calls = transport.calls();
    assert_eq!(
        calls[0],
        Call::Copy {
            to_chat: CHANNEL.to_string(),
            message_id: 31
        }
    );
    assert!(transport.sent_texts()[0].contains("Frieren"));

    let results = bot
        .catalog()
        .query("frieren", Duration::from_secs(5))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content_id().as_str(), "901");
    assert_eq!(results[0].owner_id(), Some("4242"));
}

#[tokio::test]
async fn test_upload_archived_but_not_indexed_is_reported() {
    let (bot, transport) = setup();
    bot.catalog().close().await.unwrap();

    let result = bot.handle_update(&private_upload(33, "#movie Heat")).await;

    assert!(result.is_err());
    let calls = transport.calls();
    assert!(matches!(calls[0], Call::Copy { message_id: 33, .. }));
    let texts = transport.sent_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("archived but could not be added"), "{}", texts[0]);
}

#[tokio::test]
async fn test_oversized_upload_never_reaches_archive() {
    let (bot, transport) = setup();
    let caption = "x".repeat(Limits::default().max_caption_bytes + 1);
    let upload = update(json!({
        "update_id": 5,
        "message": {
            "message_id": 32,
            "chat": { "id": USER, "type": "private" },
            "from": { "id": USER, "first_name": "Ana" },
            "caption": caption,
            "video": { "file_id": "vid" }
        }
    }));

    bot.handle_update(&upload).await.unwrap();

    assert!(!transport
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Copy { .. })));
    assert!(transport.sent_texts()[0].starts_with("⚠️"));
}
