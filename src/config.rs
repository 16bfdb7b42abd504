use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};
use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Facility every reading of a run is attributed to.
    #[serde(default = "default_facility_id")]
    pub facility_id: i64,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// When set, every attachment is also written here.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_facility_id() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_folder")]
    pub folder: String,
    /// How many of the most recent messages a run looks at.
    #[serde(default = "default_recent")]
    pub recent: usize,
}

fn default_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_recent() -> usize {
    3
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            folder: default_folder(),
            recent: default_recent(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Supabase / PostgREST table endpoint.
    Postgrest,
    /// Local SQLite file.
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Postgrest
}

fn default_table() -> String {
    "scraped_emails".to_string()
}

fn default_db_path() -> String {
    "msgstore/consumption.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            table: default_table(),
            db_path: default_db_path(),
        }
    }
}

/// Mailbox login, read from `EMAIL` / `EMAIL_PASSWORD`.
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let user = env::var("EMAIL")
            .map_err(|_| Error::Config("EMAIL env var required".to_string()))?;
        let password = env::var("EMAIL_PASSWORD")
            .map_err(|_| Error::Config("EMAIL_PASSWORD env var required".to_string()))?;
        Ok(Self { user, password })
    }
}

/// REST endpoint of the consumption store, read from `SUPABASE_URL` / `SUPABASE_ANON_KEY`.
pub struct RestEndpoint {
    pub url: String,
    pub key: String,
}

impl RestEndpoint {
    /// `None` when either variable is missing or empty.
    pub fn from_env() -> Option<Self> {
        let url = env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty())?;
        let key = env::var("SUPABASE_ANON_KEY").ok().filter(|v| !v.is_empty())?;
        Some(Self { url, key })
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the file if it exists, otherwise run on defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "Loading config");
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Self::parse("")
        }
    }
}
