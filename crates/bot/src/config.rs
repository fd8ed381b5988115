use std::{fmt, fs, path::Path, time::Duration};

use serde::Deserialize;
use shared::{
    domain::{ChannelRef, ChatId},
    error::DomainError,
};
use telegram_integration::DEFAULT_API_URL;
use thiserror::Error;

pub const SETTINGS_FILE: &str = "bot.toml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./subscriptions.db";
pub const DEFAULT_REWARD_URL: &str = "https://youtu.be/tR_bGpJTkTw?si=W2jexfGgviuYcepk";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
/// Longest long-poll the Bot API honours.
const MAX_POLL_TIMEOUT_SECS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("invalid CHANNEL_USERNAME: {0}")]
    Channel(#[from] DomainError),
    #[error("failed to parse {path}: {source}")]
    File {
        path: String,
        source: toml::de::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Optional settings file; every key mirrors an environment variable.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_token: Option<String>,
    channel_username: Option<String>,
    database_url: Option<String>,
    reward_url: Option<String>,
    telegram_api_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    operator_chat_id: Option<i64>,
}

#[derive(Clone)]
pub struct Settings {
    pub api_token: String,
    pub channel: ChannelRef,
    pub database_url: String,
    pub reward_url: String,
    pub telegram_api_url: String,
    pub poll_timeout: Duration,
    pub operator_chat: Option<ChatId>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_token", &"<redacted>")
            .field("channel", &self.channel)
            .field("database_url", &self.database_url)
            .field("reward_url", &self.reward_url)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("poll_timeout", &self.poll_timeout)
            .field("operator_chat", &self.operator_chat)
            .finish()
    }
}

/// Defaults, then `bot.toml`, then `.env`, then the process environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let file = read_settings_file(Path::new(SETTINGS_FILE))?;
    dotenvy::dotenv().ok();
    resolve_settings(file.as_deref(), |name| std::env::var(name).ok())
}

fn read_settings_file(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}

pub(crate) fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let file_cfg = match file {
        Some(raw) => toml::from_str::<FileSettings>(raw).map_err(|source| ConfigError::File {
            path: SETTINGS_FILE.to_string(),
            source,
        })?,
        None => FileSettings::default(),
    };

    let pick = |name: &str, from_file: Option<String>| {
        env(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or(from_file.filter(|v| !v.trim().is_empty()))
    };

    let api_token =
        pick("API_TOKEN", file_cfg.api_token).ok_or(ConfigError::Missing("API_TOKEN"))?;
    let channel_username = pick("CHANNEL_USERNAME", file_cfg.channel_username)
        .ok_or(ConfigError::Missing("CHANNEL_USERNAME"))?;
    let channel = ChannelRef::parse(&channel_username)?;

    let database_url = normalize_database_url(
        &pick("DATABASE_URL", file_cfg.database_url).unwrap_or_default(),
    );
    let reward_url =
        pick("REWARD_URL", file_cfg.reward_url).unwrap_or_else(|| DEFAULT_REWARD_URL.to_string());
    let telegram_api_url = pick("TELEGRAM_API_URL", file_cfg.telegram_api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let poll_timeout_secs = match env("POLL_TIMEOUT_SECS") {
        Some(raw) if raw.trim().is_empty() => file_cfg.poll_timeout_secs,
        Some(raw) => Some(parse_number("POLL_TIMEOUT_SECS", &raw)?),
        None => file_cfg.poll_timeout_secs,
    }
    .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
    if poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
        return Err(ConfigError::Invalid {
            name: "POLL_TIMEOUT_SECS",
            value: poll_timeout_secs.to_string(),
        });
    }
    let operator_chat = match env("OPERATOR_CHAT_ID") {
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => Some(parse_number("OPERATOR_CHAT_ID", &raw)?),
        None => file_cfg.operator_chat_id,
    }
    .map(ChatId);

    Ok(Settings {
        api_token,
        channel,
        database_url,
        reward_url,
        telegram_api_url,
        poll_timeout: Duration::from_secs(poll_timeout_secs),
        operator_chat,
    })
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

pub(crate) fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
