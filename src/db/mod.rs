pub mod models;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const SETTING_KEYS: &[&str] = &[
    "api_base_url",
    "top_k",
    "max_upload_mb",
    "speech_language",
    "request_timeout_secs",
    "purge_remote_on_clear",
];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("Could not create settings directory: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for SettingsError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Client configuration resolved from the settings table.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub top_k: usize,
    pub max_upload_mb: u64,
    pub speech_language: String,
    pub request_timeout_secs: u64,
    pub purge_remote_on_clear: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            top_k: 5,
            max_upload_mb: 50,
            speech_language: "en-US".to_string(),
            request_timeout_secs: 60,
            purge_remote_on_clear: false,
        }
    }
}

impl ClientSettings {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(app_dir: &std::path::Path) -> Result<Self, SettingsError> {
        std::fs::create_dir_all(app_dir)?;
        let conn = Connection::open(app_dir.join("doc-chat.db"))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, SettingsError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SettingsError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<(), SettingsError> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        self.conn().execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), SettingsError> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Resolve every known key, falling back to defaults for missing or
    /// malformed values.
    pub fn load_settings(&self) -> Result<ClientSettings, SettingsError> {
        let defaults = ClientSettings::default();
        Ok(ClientSettings {
            api_base_url: self
                .get_setting("api_base_url")?
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            top_k: self.parsed("top_k", defaults.top_k)?,
            max_upload_mb: self.parsed("max_upload_mb", defaults.max_upload_mb)?,
            speech_language: self
                .get_setting("speech_language")?
                .unwrap_or(defaults.speech_language),
            request_timeout_secs: self
                .parsed("request_timeout_secs", defaults.request_timeout_secs)?,
            purge_remote_on_clear: self
                .parsed("purge_remote_on_clear", defaults.purge_remote_on_clear)?,
        })
    }

    fn parsed<T: FromStr>(&self, key: &str, fallback: T) -> Result<T, SettingsError> {
        match self.get_setting(key)? {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => Ok(value),
                Err(_) => {
                    log::warn!("[settings] ignoring malformed {}={:?}", key, raw);
                    Ok(fallback)
                }
            },
            None => Ok(fallback),
        }
    }
}
