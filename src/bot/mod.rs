//! Chat front end for the catalog.
//!
//! Routes Telegram updates to the catalog and renders the answers:
//! - Channel posts with a video or document are indexed
//! - `/start` opens the menu, `/search <text>` lists matching files
//! - Menu buttons edit the menu in place or run a genre search
//! - Files sent privately are copied to the archive channel and indexed
//!   with the sender as owner

pub mod menu;
pub mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::adapters::telegram::{CallbackQuery, Message, TelegramClient, Update};
use crate::adapters::ChatTransport;
use crate::config::Limits;
use crate::library::extractor::caption_or_file_name;
use crate::library::{Catalog, CatalogError, InsertRequest};

use menu::{Screen, Transition};

/// Pause before polling again after a transport failure
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Settings the bot needs at runtime
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Archive channel ID as configured (e.g. `-1001234567890`)
    pub channel_id: String,
    pub insert_timeout: Duration,
    pub query_timeout: Duration,
    pub max_results: usize,
}

impl BotSettings {
    pub fn new(channel_id: impl Into<String>, limits: &Limits) -> Self {
        Self {
            channel_id: channel_id.into(),
            insert_timeout: limits.insert_timeout,
            query_timeout: limits.query_timeout,
            max_results: limits.max_results,
        }
    }

    fn is_archive_channel(&self, chat_id: i64) -> bool {
        self.channel_id.trim() == chat_id.to_string()
    }
}

/// Update dispatcher
pub struct Bot<T: ChatTransport> {
    transport: Arc<T>,
    catalog: Catalog,
    settings: BotSettings,
}

impl<T: ChatTransport> Bot<T> {
    pub fn new(transport: Arc<T>, catalog: Catalog, settings: BotSettings) -> Self {
        Self {
            transport,
            catalog,
            settings,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Handle a single update
    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        if let Some(post) = &update.channel_post {
            return self.index_channel_post(post).await;
        }
        if let Some(callback) = &update.callback_query {
            return self.handle_callback(callback).await;
        }
        if let Some(message) = &update.message {
            return self.handle_message(message).await;
        }

        debug!(update_id = update.update_id, "Ignoring update without payload");
        Ok(())
    }

    async fn index_channel_post(&self, post: &Message) -> Result<()> {
        if !self.settings.is_archive_channel(post.chat.id) {
            debug!(chat_id = post.chat.id, "Post from another channel, skipping");
            return Ok(());
        }
        let Some(media) = post.media() else {
            return Ok(());
        };

        let raw_text = caption_or_file_name(post.caption.as_deref(), media.file_name.as_deref());
        let mut request = InsertRequest::new(post.message_id.to_string(), raw_text);
        request.size_bytes = media.file_size;

        match self
            .catalog
            .ingest(request, self.settings.insert_timeout)
            .await
        {
            Ok(_) => Ok(()),
            Err(CatalogError::DuplicateContent(id)) => {
                debug!(content_id = %id, "Channel post already indexed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;

        if let Some(text) = message.text.as_deref() {
            let (command, args) = split_command(text);
            return match command {
                "/start" => {
                    let keyboard = Screen::Main.keyboard();
                    self.transport
                        .send_message(chat_id, render::WELCOME, Some(&keyboard))
                        .await
                        .map(|_| ())
                }
                "/search" => self.search(chat_id, args).await,
                _ => Ok(()),
            };
        }

        if message.chat.is_private() && message.media().is_some() {
            return self.accept_upload(message).await;
        }

        Ok(())
    }

    async fn handle_callback(&self, callback: &CallbackQuery) -> Result<()> {
        self.transport.answer_callback_query(&callback.id).await?;

        let Some(data) = callback.data.as_deref() else {
            return Ok(());
        };
        let Some(message) = &callback.message else {
            return Ok(());
        };

        match menu::transition(data) {
            Some(Transition::Show(screen)) => {
                let keyboard = screen.keyboard();
                self.transport
                    .edit_message_text(
                        message.chat.id,
                        message.message_id,
                        screen.text(),
                        Some(&keyboard),
                    )
                    .await
            }
            Some(Transition::SearchTag(tag)) => self.search(message.chat.id, &tag).await,
            None => {
                debug!(data, "Unhandled callback data");
                Ok(())
            }
        }
    }

    /// Run a search and send one card per result
    async fn search(&self, chat_id: i64, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            self.transport
                .send_message(chat_id, render::SEARCH_USAGE, None)
                .await?;
            return Ok(());
        }

        let mut results = self.catalog.query(text, self.settings.query_timeout);
        let mut sent = 0;

        while sent < self.settings.max_results {
            let Some(item) = results.next_record().await else {
                break;
            };
            let record = item?;
            let keyboard = render::download_keyboard(&self.settings.channel_id, &record);
            self.transport
                .send_message(chat_id, &render::result_card(&record), Some(&keyboard))
                .await?;
            sent += 1;
        }

        let cut_short = results.was_cut_short();
        if cut_short {
            warn!(query = text, sent, "Search hit its deadline");
        }
        if sent == 0 {
            let reply = if cut_short {
                render::search_timed_out(text.trim())
            } else {
                render::no_results(text.trim())
            };
            self.transport.send_message(chat_id, &reply, None).await?;
        }

        info!(query = text, sent, "Search answered");
        Ok(())
    }

    async fn accept_upload(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        let Some(media) = message.media() else {
            return Ok(());
        };
        let owner = message
            .from
            .as_ref()
            .map(|u| u.id)
            .unwrap_or(chat_id)
            .to_string();

        let raw_text =
            caption_or_file_name(message.caption.as_deref(), media.file_name.as_deref());
        // Checked before copying so rejected files never reach the archive
        if raw_text.len() > self.catalog.max_text_bytes() {
            let reason = format!("caption longer than {} bytes", self.catalog.max_text_bytes());
            self.transport
                .send_message(chat_id, &render::upload_rejected(&reason), None)
                .await?;
            return Ok(());
        }

        let archived_id = self
            .transport
            .copy_message(&self.settings.channel_id, chat_id, message.message_id)
            .await?;

        let mut request = InsertRequest::new(archived_id.to_string(), raw_text).with_owner(owner);
        request.size_bytes = media.file_size;

        let reply = match self
            .catalog
            .ingest(request, self.settings.insert_timeout)
            .await
        {
            Ok(record) => render::upload_accepted(&record),
            Err(e @ (CatalogError::Validation(_) | CatalogError::DuplicateContent(_))) => {
                render::upload_rejected(&e.to_string())
            }
            Err(e) => {
                self.transport
                    .send_message(chat_id, &render::upload_not_indexed(&e.to_string()), None)
                    .await?;
                return Err(e.into());
            }
        };

        self.transport.send_message(chat_id, &reply, None).await?;
        Ok(())
    }
}

/// Split `/cmd@botname rest` into (`/cmd`, `rest`)
fn split_command(text: &str) -> (&str, &str) {
    let text = text.trim();
    let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let command = head.split('@').next().unwrap_or(head);
    (command, rest.trim())
}

/// Long-poll Telegram until Ctrl-C, then close the catalog
pub async fn serve(bot: Bot<TelegramClient>, poll_timeout_secs: u64) -> Result<()> {
    info!(
        channel = %bot.settings.channel_id,
        backend = bot.catalog.backend(),
        "Bot started"
    );

    let mut offset = 0;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let updates = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            polled = bot.transport.get_updates(offset, poll_timeout_secs) => polled,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Polling failed, retrying");
                tokio::time::sleep(POLL_BACKOFF).await;
                continue;
            }
        };

        for update in &updates {
            offset = offset.max(update.update_id + 1);
            if let Err(e) = bot.handle_update(update).await {
                error!(update_id = update.update_id, error = %e, "Failed to handle update");
            }
        }
    }

    bot.catalog.close().await?;
    Ok(())
}
