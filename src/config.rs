//! Configuration for cinebot.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BOT_TOKEN, CHANNEL_ID, CINEBOT_HOME, CINEBOT_DB)
//! 2. Config file (.cinebot/config.yaml)
//! 3. Defaults (~/.cinebot)
//!
//! Config file discovery:
//! - Searches current directory and parents for .cinebot/config.yaml
//! - Relative paths in the config file resolve against the `.cinebot/` directory

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::library::{Catalog, CatalogStore, MemoryStore, SqliteStore};

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub telegram: Option<TelegramSection>,
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub limits: Option<LimitsSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub backend: Option<StorageBackend>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    pub insert_timeout_ms: Option<u64>,
    pub query_timeout_ms: Option<u64>,
    pub max_caption_bytes: Option<usize>,
    pub max_results: Option<usize>,
    pub poll_timeout_secs: Option<u64>,
}

/// Which catalog store to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite database file
    pub database: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub backend: StorageBackend,
    pub telegram: TelegramSettings,
    pub limits: Limits,
}

#[derive(Debug, Clone, Default)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    /// Archive channel that files are indexed from and linked to
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub insert_timeout: Duration,
    pub query_timeout: Duration,
    pub max_caption_bytes: usize,
    /// Result cards sent per search
    pub max_results: usize,
    /// Long-poll wait for getUpdates
    pub poll_timeout_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            insert_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(10),
            max_caption_bytes: 4096,
            max_results: 10,
            poll_timeout_secs: 30,
        }
    }
}

impl Limits {
    fn from_section(section: Option<&LimitsSection>) -> Self {
        let defaults = Self::default();
        let Some(s) = section else {
            return defaults;
        };

        Self {
            insert_timeout: s
                .insert_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.insert_timeout),
            query_timeout: s
                .query_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_timeout),
            max_caption_bytes: s.max_caption_bytes.unwrap_or(defaults.max_caption_bytes),
            max_results: s.max_results.unwrap_or(defaults.max_results),
            poll_timeout_secs: s.poll_timeout_secs.unwrap_or(defaults.poll_timeout_secs),
        }
    }
}

impl ResolvedConfig {
    /// Open the configured store and wrap it in a catalog
    pub async fn open_catalog(&self) -> Result<Catalog> {
        let store: Arc<dyn CatalogStore> = match self.backend {
            StorageBackend::Sqlite => Arc::new(
                SqliteStore::open(&self.database)
                    .await
                    .with_context(|| format!("Failed to open {}", self.database.display()))?,
            ),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory catalog; indexed files are lost on exit");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Catalog::new(store).with_max_text_bytes(self.limits.max_caption_bytes))
    }

    /// Bot token, required for `serve`
    pub fn require_bot_token(&self) -> Result<&str> {
        self.telegram
            .bot_token
            .as_deref()
            .context("BOT_TOKEN is not set (environment or telegram.bot_token)")
    }

    /// Archive channel ID, required for `serve`
    pub fn require_channel_id(&self) -> Result<&str> {
        self.telegram
            .channel_id
            .as_deref()
            .context("CHANNEL_ID is not set (environment or telegram.channel_id)")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".cinebot").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge file settings, environment and defaults
fn resolve(
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let (config_file, config) = match file {
        Some((path, config)) => (Some(path), Some(config)),
        None => (None, None),
    };
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let home = env("CINEBOT_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.paths.home.as_deref())
                .map(|h| resolve_path(&base_dir, h))
        })
        .unwrap_or(default_home);

    let database = env("CINEBOT_DB")
        .map(PathBuf::from)
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.paths.database.as_deref())
                .map(|d| resolve_path(&base_dir, d))
        })
        .unwrap_or_else(|| home.join("catalog.db"));

    let telegram_file = config.as_ref().and_then(|c| c.telegram.clone());
    let telegram = TelegramSettings {
        bot_token: env("BOT_TOKEN")
            .or_else(|| telegram_file.as_ref().and_then(|t| t.bot_token.clone())),
        channel_id: env("CHANNEL_ID")
            .or_else(|| telegram_file.as_ref().and_then(|t| t.channel_id.clone())),
    };

    let backend = config
        .as_ref()
        .and_then(|c| c.storage.as_ref())
        .and_then(|s| s.backend)
        .unwrap_or(StorageBackend::Sqlite);

    let limits = Limits::from_section(config.as_ref().and_then(|c| c.limits.as_ref()));

    ResolvedConfig {
        home,
        database,
        config_file,
        backend,
        telegram,
        limits,
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".cinebot");

    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    Ok(resolve(
        file,
        |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
        default_home,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env, PathBuf::from("/home/u/.cinebot"));

        assert_eq!(config.home, PathBuf::from("/home/u/.cinebot"));
        assert_eq!(config.database, PathBuf::from("/home/u/.cinebot/catalog.db"));
        assert_eq!(config.backend, StorageBackend::Sqlite);
        assert!(config.config_file.is_none());
        assert!(config.require_bot_token().is_err());
        assert_eq!(config.limits.max_results, 10);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".cinebot");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  database: data/files.db
telegram:
  channel_id: "-1001234567890"
storage:
  backend: memory
limits:
  query_timeout_ms: 2500
  max_results: 3
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");

        let config = resolve(
            Some((config_path.clone(), parsed)),
            no_env,
            PathBuf::from("/unused"),
        );
        assert_eq!(config.database, dir.join("data/files.db"));
        assert_eq!(config.backend, StorageBackend::Memory);
        assert_eq!(config.require_channel_id().unwrap(), "-1001234567890");
        assert_eq!(config.limits.query_timeout, Duration::from_millis(2500));
        assert_eq!(config.limits.max_results, 3);
        // Unset limits keep their defaults
        assert_eq!(config.limits.max_caption_bytes, 4096);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = ConfigFile {
            version: "1.0".to_string(),
            paths: PathsConfig {
                home: Some("/from/file".to_string()),
                database: None,
            },
            telegram: Some(TelegramSection {
                bot_token: Some("file-token".to_string()),
                channel_id: Some("-100".to_string()),
            }),
            storage: None,
            limits: None,
        };
        let env: HashMap<&str, &str> =
            [("BOT_TOKEN", "env-token"), ("CINEBOT_HOME", "/from/env")].into();

        let config = resolve(
            Some((PathBuf::from("/proj/.cinebot/config.yaml"), file)),
            |k| env.get(k).map(|v| v.to_string()),
            PathBuf::from("/unused"),
        );

        assert_eq!(config.require_bot_token().unwrap(), "env-token");
        assert_eq!(config.require_channel_id().unwrap(), "-100");
        assert_eq!(config.home, PathBuf::from("/from/env"));
        assert_eq!(config.database, PathBuf::from("/from/env/catalog.db"));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.cinebot");

        assert_eq!(
            resolve_path(&base, "catalog.db"),
            PathBuf::from("/home/user/project/.cinebot/catalog.db")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/catalog.db"),
            PathBuf::from("/absolute/catalog.db")
        );
    }
}
