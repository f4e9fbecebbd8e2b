//! Command-line interface for cinebot.
//!
//! Provides commands for running the bot, indexing captions by hand,
//! searching the catalog and inspecting extraction and configuration.

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::TelegramClient;
use crate::bot::{self, Bot, BotSettings};
use crate::config::{self, ResolvedConfig};
use crate::library::{extract, InsertRequest, Record};

/// cinebot - channel-indexed movie and anime catalog
#[derive(Parser, Debug)]
#[command(name = "cinebot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Telegram bot (long polling)
    Serve,

    /// Index a caption as if it had been posted to the channel
    Index {
        /// Source message ID
        #[arg(long)]
        content_id: String,

        /// Caption file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// File size in bytes
        #[arg(long)]
        size: Option<u64>,

        /// Uploader ID
        #[arg(long)]
        owner: Option<String>,
    },

    /// Search the catalog
    Search {
        /// Title substring or #tag
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show what would be extracted from a caption
    Extract {
        /// Caption file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::load_config()?;

        match self.command {
            Commands::Serve => serve(&cfg).await,
            Commands::Index {
                content_id,
                input,
                size,
                owner,
            } => index_caption(&cfg, content_id, input, size, owner).await,
            Commands::Search { query, json } => search_catalog(&cfg, &query.join(" "), json).await,
            Commands::Extract { input } => show_extraction(input),
            Commands::Config => show_config(&cfg),
        }
    }
}

/// Read caption text from a file or stdin
fn read_input(input_file: Option<PathBuf>) -> Result<String> {
    if let Some(path) = input_file {
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

async fn serve(cfg: &ResolvedConfig) -> Result<()> {
    let token = cfg.require_bot_token()?.to_string();
    let channel_id = cfg.require_channel_id()?.to_string();

    let catalog = cfg.open_catalog().await?;
    catalog
        .health_check()
        .await
        .context("Catalog store is not reachable")?;

    let client = TelegramClient::new(token, cfg.limits.poll_timeout_secs)?;
    let settings = BotSettings::new(channel_id, &cfg.limits);
    let bot = Bot::new(Arc::new(client), catalog, settings);

    bot::serve(bot, cfg.limits.poll_timeout_secs).await
}

async fn index_caption(
    cfg: &ResolvedConfig,
    content_id: String,
    input: Option<PathBuf>,
    size: Option<u64>,
    owner: Option<String>,
) -> Result<()> {
    let raw_text = read_input(input)?;
    let request = InsertRequest {
        content_id,
        raw_text,
        size_bytes: size,
        owner_id: owner,
    };

    let catalog = cfg.open_catalog().await?;
    let result = catalog.ingest(request, cfg.limits.insert_timeout).await;
    catalog.close().await?;
    let record = result?;

    eprintln!("✅ Indexed {}", record.content_id());
    print_record(&record);
    Ok(())
}

async fn search_catalog(cfg: &ResolvedConfig, query: &str, json: bool) -> Result<()> {
    let catalog = cfg.open_catalog().await?;
    let results = catalog
        .query(query, cfg.limits.query_timeout)
        .try_collect()
        .await;
    catalog.close().await?;
    let results = results?;

    if json {
        for record in &results {
            println!("{}", serde_json::to_string(record)?);
        }
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s) for \"{}\":\n", results.len(), query);
    println!("{:<14} {:<40} {:<10} {}", "ID", "TITLE", "QUALITY", "TAGS");
    println!("{}", "-".repeat(80));

    for record in &results {
        let title: String = if record.title().chars().count() > 37 {
            format!("{}...", record.title().chars().take(37).collect::<String>())
        } else {
            record.title().to_string()
        };
        println!(
            "{:<14} {:<40} {:<10} {}",
            record.content_id().as_str(),
            title,
            record.quality(),
            record.tags().join(" ")
        );
    }

    Ok(())
}

fn show_extraction(input: Option<PathBuf>) -> Result<()> {
    let raw_text = read_input(input)?;
    let extracted = extract(&raw_text, None);

    println!("Title:   {}", extracted.title);
    println!("Tags:    {}", extracted.tags.join(", "));
    println!("Quality: {}", extracted.quality);
    Ok(())
}

fn print_record(record: &Record) {
    println!("  Title:   {}", record.title());
    println!("  Tags:    {}", record.tags().join(", "));
    println!("  Quality: {}", record.quality());
    println!("  Size:    {}", record.size_label());
    if let Some(owner) = record.owner_id() {
        println!("  Owner:   {}", owner);
    }
}

/// Show the resolved configuration (for debugging)
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    let mask = |value: Option<&str>| match value {
        Some(_) => "(set)".to_string(),
        None => "(not set)".to_string(),
    };

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!("  Backend:  {:?}", cfg.backend);
    println!();
    println!("Telegram:");
    println!("  Bot token:  {}", mask(cfg.telegram.bot_token.as_deref()));
    println!(
        "  Channel ID: {}",
        cfg.telegram.channel_id.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Limits:");
    println!("  Insert timeout:    {:?}", cfg.limits.insert_timeout);
    println!("  Query timeout:     {:?}", cfg.limits.query_timeout);
    println!("  Max caption bytes: {}", cfg.limits.max_caption_bytes);
    println!("  Max results:       {}", cfg.limits.max_results);
    println!("  Poll timeout:      {}s", cfg.limits.poll_timeout_secs);

    Ok(())
}
