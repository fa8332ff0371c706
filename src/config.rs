//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::Connection;

use crate::db::get_config_value;
use crate::error::ConfigError;

/// Language of the failure notices appended to an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            other => Err(ConfigError::InvalidValue {
                key: "locale".to_string(),
                message: format!("unsupported locale {:?}", other),
            }),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Model used for answers.
    pub model: String,
    pub connect_timeout: Duration,
    /// Longest wait for the next piece of the response before it is a timeout.
    pub read_timeout: Duration,
    pub locale: Locale,
    pub db_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            locale: Locale::En,
            db_path: PathBuf::from("./data/answer-stream.db"),
        }
    }
}

impl AppConfig {
    /// Apply `ANSWER_STREAM_*` overrides looked up through `var`.
    pub fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("ANSWER_STREAM_OLLAMA_URL") {
            self.ollama_url = url;
        }
        if let Some(model) = var("ANSWER_STREAM_MODEL") {
            self.model = model;
        }
        if let Some(secs) = var("ANSWER_STREAM_READ_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "ANSWER_STREAM_READ_TIMEOUT_SECS".to_string(),
                message: format!("expected whole seconds, got {:?}", secs),
            })?;
            self.read_timeout = Duration::from_secs(secs);
        }
        if let Some(locale) = var("ANSWER_STREAM_LOCALE") {
            self.locale = locale.parse()?;
        }
        if let Some(path) = var("ANSWER_STREAM_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply settings saved in the `app_config` table.
    pub fn apply_stored(&mut self, conn: &Connection) -> Result<(), ConfigError> {
        if let Some(model) = get_config_value(conn, "selected_model_name")?.filter(|m| !m.is_empty()) {
            self.model = model;
        }
        if let Some(url) = get_config_value(conn, "ollama_url")?.filter(|u| !u.is_empty()) {
            self.ollama_url = url;
        }
        if let Some(locale) = get_config_value(conn, "locale")? {
            self.locale = locale.parse()?;
        }
        Ok(())
    }
}
