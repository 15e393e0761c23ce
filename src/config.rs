use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::oracle::tts::DEFAULT_ENDPOINT;

/// Environment variable that overrides the token from the config file.
pub const TOKEN_ENV: &str = "BOT_TOKEN";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// No bot token in the file or the environment.
    MissingToken,
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::MissingToken => write!(
                f,
                "bot token missing: set {} or telegram_bot_token in the config file",
                TOKEN_ENV
            ),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::MissingToken | Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    telegram_bot_token: String,
    /// Seconds a user must wait between two accepted questions.
    cooldown_secs: Option<u64>,
    /// Directory for logs and temporary voice files. Defaults to current directory.
    data_dir: Option<String>,
    /// Speech endpoint (Google Translate TTS compatible).
    tts_endpoint: Option<String>,
    tts_timeout_secs: Option<u64>,
    /// ffmpeg executable name or path.
    ffmpeg_path: Option<String>,
    transcode_timeout_secs: Option<u64>,
    /// Rate-limit entries older than cooldown × factor are evicted.
    eviction_factor: Option<u32>,
}

pub struct Config {
    pub telegram_bot_token: String,
    pub cooldown: Duration,
    /// Directory for state files (logs, voices).
    pub data_dir: PathBuf,
    pub tts_endpoint: String,
    pub tts_timeout: Duration,
    pub ffmpeg_path: PathBuf,
    pub transcode_timeout: Duration,
    pub eviction_factor: u32,
}

impl Config {
    /// Load from `path` (if it exists) with the token overridable by `BOT_TOKEN`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let env_token = std::env::var(TOKEN_ENV).ok();
        Self::load_with_token(path, env_token)
    }

    fn load_with_token<P: AsRef<Path>>(
        path: P,
        env_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
            serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?
        } else {
            ConfigFile::default()
        };

        let token = env_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(file.telegram_bot_token);
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }

        let cooldown_secs = file.cooldown_secs.unwrap_or(10);
        let tts_timeout_secs = file.tts_timeout_secs.unwrap_or(15);
        let transcode_timeout_secs = file.transcode_timeout_secs.unwrap_or(20);
        for (name, value) in [
            ("cooldown_secs", cooldown_secs),
            ("tts_timeout_secs", tts_timeout_secs),
            ("transcode_timeout_secs", transcode_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be positive")));
            }
        }
        let eviction_factor = file.eviction_factor.unwrap_or(6);
        if eviction_factor == 0 {
            return Err(ConfigError::Validation("eviction_factor must be positive".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: token,
            cooldown: Duration::from_secs(cooldown_secs),
            data_dir,
            tts_endpoint: file.tts_endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            tts_timeout: Duration::from_secs(tts_timeout_secs),
            ffmpeg_path: PathBuf::from(file.ffmpeg_path.unwrap_or_else(|| "ffmpeg".to_string())),
            transcode_timeout: Duration::from_secs(transcode_timeout_secs),
            eviction_factor,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn voice_dir(&self) -> PathBuf {
        self.data_dir.join("voices")
    }
}
