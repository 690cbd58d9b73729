//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,

    // --- Derivation service ---
    pub claude_api_key: Option<String>,
    pub claude_model: String,
    pub claude_base_url: String,
    pub claude_max_tokens: u32,
    pub claude_timeout: Duration,

    // --- Transcript acquisition ---
    pub ytdlp_path: Option<PathBuf>,
    pub tool_timeout: Duration,
    pub caption_timeout: Duration,

    pub concepts_min: u32,
    pub concepts_max: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load the API Key (as optional) ---
        let claude_api_key = lookup("CLAUDE_API_KEY").filter(|k| !k.trim().is_empty());
        let claude_model = lookup("CLAUDE_MODEL")
            .unwrap_or_else(|| "claude-sonnet-4-5-20250929".to_string());
        let claude_base_url = lookup("CLAUDE_BASE_URL")
            .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string());
        let claude_max_tokens = parse_or(&lookup, "CLAUDE_MAX_TOKENS", 4096)?;
        let claude_timeout = Duration::from_secs(parse_or(&lookup, "CLAUDE_TIMEOUT_SECS", 60)?);

        // --- Load Adapter-specific Settings ---
        let ytdlp_path = lookup("YTDLP_PATH").map(PathBuf::from);
        let tool_timeout = Duration::from_secs(parse_or(&lookup, "TOOL_TIMEOUT_SECS", 120)?);
        let caption_timeout = Duration::from_secs(parse_or(&lookup, "CAPTION_TIMEOUT_SECS", 30)?);

        let concepts_min = parse_or(&lookup, "CONCEPTS_MIN", 3)?;
        let concepts_max = parse_or(&lookup, "CONCEPTS_MAX", 7)?;
        if concepts_min == 0 || concepts_min > concepts_max {
            return Err(ConfigError::InvalidValue(
                "CONCEPTS_MIN".to_string(),
                format!("must be between 1 and CONCEPTS_MAX ({})", concepts_max),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            claude_api_key,
            claude_model,
            claude_base_url,
            claude_max_tokens,
            claude_timeout,
            ytdlp_path,
            tool_timeout,
            caption_timeout,
            concepts_min,
            concepts_max,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
