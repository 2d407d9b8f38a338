//! Portal configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use crate::controller::HydrationPolicy;
use crate::identity::Timeouts;
use crate::identity::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::store::SESSION_FILE_NAME;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8001/api";

pub const API_URL_VAR: &str = "PORTAL_API_URL";
pub const SESSION_FILE_VAR: &str = "PORTAL_SESSION_FILE";
pub const VALIDATE_SESSION_VAR: &str = "PORTAL_VALIDATE_SESSION";
pub const REQUEST_TIMEOUT_VAR: &str = "PORTAL_REQUEST_TIMEOUT_SECS";
pub const CONNECT_TIMEOUT_VAR: &str = "PORTAL_CONNECT_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
    #[error("{var} must be true or false, got '{value}'")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} must be a positive number of seconds, got '{value}'")]
    InvalidSeconds { var: &'static str, value: String },
    #[error("no per-user data directory on this platform; set {SESSION_FILE_VAR}")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// Identity service root including the mount prefix, without trailing `/`.
    pub api_base_url: String,
    pub session_path: PathBuf,
    pub hydration: HydrationPolicy,
    pub timeouts: Timeouts,
}

impl PortalConfig {
    /// Build typed portal config from environment variables.
    ///
    /// Optional:
    /// - `PORTAL_API_URL`: default `http://127.0.0.1:8001/api`
    /// - `PORTAL_SESSION_FILE`: default `<data dir>/session.json`
    /// - `PORTAL_VALIDATE_SESSION`: `true` (default) or `false`
    /// - `PORTAL_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PORTAL_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    /// Same as [`PortalConfig::from_env`] with an injectable source.
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// See [`PortalConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_base_url = match var(API_URL_VAR) {
            Some(value) => parse_url(API_URL_VAR, value)?,
            None => DEFAULT_API_URL.to_owned(),
        };
        let session_path = match var(SESSION_FILE_VAR) {
            Some(value) => PathBuf::from(value),
            None => default_session_path()?,
        };
        let validate = var(VALIDATE_SESSION_VAR).map(|value| parse_bool(VALIDATE_SESSION_VAR, &value)).transpose()?;
        let hydration = match validate {
            Some(false) => HydrationPolicy::Trust,
            Some(true) | None => HydrationPolicy::Validate,
        };
        let timeouts = Timeouts {
            request: parse_secs(REQUEST_TIMEOUT_VAR, var(REQUEST_TIMEOUT_VAR), DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect: parse_secs(CONNECT_TIMEOUT_VAR, var(CONNECT_TIMEOUT_VAR), DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        Ok(Self { api_base_url, session_path, hydration, timeouts })
    }
}

/// Read one process environment variable. Non-unicode values count as unset.
#[must_use]
pub fn env_var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            tracing::warn!(var = key, "ignoring non-unicode environment value");
            None
        }
    }
}

/// `<platform data dir>/session.json`, e.g. `~/.local/share/portal/session.json`.
///
/// # Errors
///
/// `NoDataDir` when the platform has no home directory to anchor it.
pub fn default_session_path() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("com", "SportsPortal", "portal")
        .map(|dirs| dirs.data_dir().join(SESSION_FILE_NAME))
        .ok_or(ConfigError::NoDataDir)
}

fn parse_url(var: &'static str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_owned())
    } else {
        Err(ConfigError::InvalidUrl { var, value })
    }
}

pub(crate) fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value: value.to_owned() }),
    }
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidSeconds { var, value }),
    }
}
