//! Router configuration.
//!
//! Values come from `PERSONA_ROUTER_*` environment variables (optionally loaded
//! from a `.env` file) and fall back to the defaults below.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use validator::Validate;

const ENV_PREFIX: &str = "PERSONA_ROUTER_";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Bunyan,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "bunyan" => Ok(LogFormat::Bunyan),
            other => Err(AppError::Config(format!("unknown log format: {}", other))),
        }
    }
}

/// Tunables for persistence and switching policy.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouterConfig {
    /// SQLite connection URL.
    #[validate(length(min = 1))]
    pub database_url: String,
    #[validate(range(min = 1, max = 64))]
    pub max_connections: u32,
    /// Minimum time between two tone evaluations of one conversation.
    pub tone_check_cooldown_secs: u64,
    /// Share of matched keywords a tone needs to be considered dominant.
    #[validate(range(min = 0.0, max = 1.0))]
    pub tone_confidence_threshold: f64,
    /// Number of recent fan messages fed to the tone classifier.
    #[validate(range(min = 1))]
    pub tone_window: usize,
    #[validate(range(min = 1))]
    pub min_tone_messages: usize,
    /// Number of recent fan messages fed to the language detector.
    #[validate(range(min = 1))]
    pub language_window: usize,
    #[validate(range(min = 1))]
    pub min_language_messages: usize,
    pub log_format: LogFormat,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://persona_router.sqlite".to_string(),
            max_connections: 5,
            tone_check_cooldown_secs: 300,
            tone_confidence_threshold: 0.4,
            tone_window: 10,
            min_tone_messages: 3,
            language_window: 5,
            min_language_messages: 2,
            log_format: LogFormat::Pretty,
        }
    }
}

impl RouterConfig {
    /// Builds a configuration from the environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            database_url: read_var("DATABASE_URL")?.unwrap_or(defaults.database_url),
            max_connections: read_var("MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            tone_check_cooldown_secs: read_var("TONE_CHECK_COOLDOWN_SECS")?
                .unwrap_or(defaults.tone_check_cooldown_secs),
            tone_confidence_threshold: read_var("TONE_CONFIDENCE_THRESHOLD")?
                .unwrap_or(defaults.tone_confidence_threshold),
            tone_window: read_var("TONE_WINDOW")?.unwrap_or(defaults.tone_window),
            min_tone_messages: read_var("MIN_TONE_MESSAGES")?.unwrap_or(defaults.min_tone_messages),
            language_window: read_var("LANGUAGE_WINDOW")?.unwrap_or(defaults.language_window),
            min_language_messages: read_var("MIN_LANGUAGE_MESSAGES")?
                .unwrap_or(defaults.min_language_messages),
            log_format: read_var("LOG_FORMAT")?.unwrap_or(defaults.log_format),
        };

        config
            .validate()
            .map_err(|e| AppError::Config(format!("invalid router configuration: {}", e)))?;
        Ok(config)
    }
}

fn read_var<T>(name: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    match env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}: {}", key, e))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(AppError::Config(format!("{}: {}", key, e))),
    }
}
