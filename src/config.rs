//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded first via dotenvy):
//! - `GARDEN_API_BASE_URL`: REST API root (default `http://localhost:8000`)
//! - `GARDEN_USERNAME` / `GARDEN_PASSWORD`: credentials for scripted logins
//! - `GARDEN_DEBUG_API`: log every request/response (default `true`)
//! - `GARDEN_SESSION_PATH`: sled directory holding the session tokens
//! - `GARDEN_LOG_DIR`: directory for the rolling JSON log
//! - `GARDEN_STALE_SECS`: how long cached reads stay fresh (default 30)
//! - `GARDEN_TIMEOUT_SECS`: per-request timeout (default 30)

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_PATH: &str = ".garden_session";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_STALE_SECS: u64 = 30;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub debug_api: bool,
    pub session_path: PathBuf,
    pub log_dir: PathBuf,
    pub stale_time: Duration,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            password: None,
            debug_api: true,
            session_path: PathBuf::from(DEFAULT_SESSION_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            stale_time: Duration::from_secs(DEFAULT_STALE_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> ApiResult<Self> {
        // Missing .env is fine; real env vars still apply
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            api_base_url: get("GARDEN_API_BASE_URL").unwrap_or(defaults.api_base_url),
            username: get("GARDEN_USERNAME"),
            password: get("GARDEN_PASSWORD"),
            debug_api: match get("GARDEN_DEBUG_API") {
                Some(value) => parse_bool("GARDEN_DEBUG_API", &value)?,
                None => defaults.debug_api,
            },
            session_path: get("GARDEN_SESSION_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
            log_dir: get("GARDEN_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            stale_time: match get("GARDEN_STALE_SECS") {
                Some(value) => Duration::from_secs(parse_secs("GARDEN_STALE_SECS", &value)?),
                None => defaults.stale_time,
            },
            timeout: match get("GARDEN_TIMEOUT_SECS") {
                Some(value) => Duration::from_secs(parse_secs("GARDEN_TIMEOUT_SECS", &value)?),
                None => defaults.timeout,
            },
        })
    }

    /// Credentials for non-interactive logins (smoke checks, scripts).
    pub fn credentials(&self) -> ApiResult<(String, String)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok((username.clone(), password.clone())),
            _ => Err(ApiError::Config(
                "GARDEN_USERNAME and GARDEN_PASSWORD must be set".to_string(),
            )),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> ApiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ApiError::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_secs(key: &str, value: &str) -> ApiResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ApiError::Config(format!("{key}: expected seconds, got '{value}'")))
}
