use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use teloxide::types::UserId;
use thiserror::Error;
use tracing::debug;

use crate::media::Volume;
use crate::toolchain::ProcessEnv;

/// One second of silence, used when ffmpeg cannot synthesize it locally.
pub const DEFAULT_SILENCE_URL: &str =
    "https://raw.githubusercontent.com/anars/blank-audio/master/1-second-of-silence.mp3";

const REQUIRED: &[(&str, &str)] = &[
    ("API_ID", "Telegram API ID (get from https://my.telegram.org)"),
    ("API_HASH", "Telegram API hash (get from https://my.telegram.org)"),
    ("BOT_TOKEN", "Telegram bot token (get from @BotFather)"),
    ("OWNER_IDS", "comma-separated list of owner user IDs"),
];

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required keys are unset. Each entry is `KEY: description`.
    #[error("missing required configuration:\n  • {}", .0.join("\n  • "))]
    Missing(Vec<String>),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_id: u32,
    pub api_hash: String,
    pub bot_token: String,
    /// Owner IDs - first ID is the primary owner.
    pub owner_ids: Vec<UserId>,
    /// Pause between consecutive account joins.
    pub join_delay: Duration,
    /// Pause between consecutive account leaves.
    pub leave_delay: Duration,
    /// Wait before joining a voice chat after connecting.
    pub voice_join_delay: Duration,
    /// Volume ceiling in percent (1..=300).
    pub max_volume: u16,
    /// Account ceiling (1..=100).
    pub max_accounts: u16,
    /// ffmpeg override; also the lookup name the bootstrap starts from.
    pub ffmpeg_path: String,
    pub session_encryption: bool,
    pub port: u16,
    pub log_dir: PathBuf,
    /// Forward warnings and errors to the owners over Telegram.
    pub notify_owners: bool,
    pub silence_url: String,
    /// Optional values that could not be parsed and fell back to defaults.
    pub warnings: Vec<String>,
}

impl Config {
    pub fn from_env(env: &ProcessEnv) -> Result<Self, ConfigError> {
        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|(key, _)| env.get_non_empty(key).is_none())
            .map(|(key, description)| format!("{key}: {description}"))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        // Presence was checked above.
        let required = |key: &str| env.get_non_empty(key).unwrap_or_default();

        let api_id = match required("API_ID").parse::<u32>() {
            Ok(id) if id > 0 => id,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "API_ID",
                    reason: "must be a positive integer".into(),
                });
            }
        };

        let bot_token = required("BOT_TOKEN").to_string();
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_valid = bot_token
            .split_once(':')
            .is_some_and(|(id, secret)| id.parse::<u64>().is_ok() && !secret.is_empty() && !secret.contains(':'));
        if !token_valid {
            return Err(ConfigError::Invalid {
                key: "BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let owner_ids = parse_owner_ids(required("OWNER_IDS"))?;
        let mut warnings = Vec::new();
        let w = &mut warnings;

        Ok(Self {
            api_id,
            api_hash: required("API_HASH").to_string(),
            bot_token,
            owner_ids,
            join_delay: Duration::from_secs(optional(env, w, "JOIN_DELAY", 2u64).max(1)),
            leave_delay: Duration::from_secs(optional(env, w, "LEAVE_DELAY", 1u64).max(1)),
            voice_join_delay: Duration::from_secs(optional(env, w, "VOICE_JOIN_DELAY", 3u64).max(1)),
            max_volume: optional(env, w, "MAX_VOLUME", 200u16).clamp(1, 300),
            max_accounts: optional(env, w, "MAX_ACCOUNTS", 50u16).clamp(1, 100),
            ffmpeg_path: optional(env, w, "FFMPEG_PATH", "ffmpeg".to_string()),
            session_encryption: optional_flag(env, "SESSION_STRING_ENCRYPTION", true),
            port: optional(env, w, "PORT", 8000u16),
            log_dir: PathBuf::from(optional(env, w, "LOG_DIR", "logs".to_string())),
            notify_owners: optional_flag(env, "NOTIFY_OWNERS", false),
            silence_url: optional(env, w, "SILENCE_URL", DEFAULT_SILENCE_URL.to_string()),
            warnings,
        })
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id)
    }

    /// A requested playback volume, capped at `max_volume`.
    pub fn volume(&self, percent: u16) -> Volume {
        Volume::new(percent, self.max_volume)
    }

    /// Human-readable summary without credentials.
    pub fn summary(&self) -> String {
        format!(
            "api_id={} owners={} max_accounts={} max_volume={}% join_delay={}s leave_delay={}s \
             voice_join_delay={}s ffmpeg={} port={} session_encryption={} notify_owners={}",
            self.api_id,
            self.owner_ids.len(),
            self.max_accounts,
            self.max_volume,
            self.join_delay.as_secs(),
            self.leave_delay.as_secs(),
            self.voice_join_delay.as_secs(),
            self.ffmpeg_path,
            self.port,
            self.session_encryption,
            self.notify_owners,
        )
    }
}

/// Only the log directory, for commands that run without credentials.
pub fn log_dir_from_env(env: &ProcessEnv) -> PathBuf {
    PathBuf::from(env.get_non_empty("LOG_DIR").unwrap_or("logs"))
}

/// Read `.env.local`, then `.env`, from the working directory into the
/// process environment. Both files are optional.
pub fn load_dotenv_files() {
    load_dotenv_files_from(Path::new("."));
}

/// Neither file overrides a variable that is already set, so the real
/// environment wins over `.env.local`, which wins over `.env`.
pub fn load_dotenv_files_from(dir: &Path) {
    for name in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_path(dir.join(name)) {
            debug!("{name} not loaded: {e}");
        }
    }
}

fn parse_owner_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    let invalid = || ConfigError::Invalid {
        key: "OWNER_IDS",
        reason: "must be comma-separated positive integers".into(),
    };
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().map(UserId).map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(ConfigError::Invalid {
            key: "OWNER_IDS",
            reason: "at least one owner ID must be specified".into(),
        });
    }
    Ok(ids)
}

fn optional<T>(env: &ProcessEnv, warnings: &mut Vec<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env.get_non_empty(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warnings.push(format!("invalid {key}={raw:?}, using default: {default}"));
            default
        }),
    }
}

fn optional_flag(env: &ProcessEnv, key: &str, default: bool) -> bool {
    env.get_non_empty(key).map_or(default, |raw| {
        matches!(raw.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
    })
}
