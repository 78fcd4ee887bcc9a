//! Client settings loaded from TOML or the environment.
//!
//! # Environment Variables
//!
//! - `REBOUND_MAX_ATTEMPTS` - Maximum attempts per call (`0` = unlimited)
//! - `REBOUND_MIN_RETRY_AFTER_MS` - `Retry-After` values at or below this are ignored
//! - `REBOUND_MAX_RETRY_AFTER_MS` - Upper bound on honored `Retry-After` values
//! - `REBOUND_TIMEOUT_MS` - Round trip timeout
//! - `REBOUND_CONNECT_TIMEOUT_MS` - Connection timeout
//! - `REBOUND_USER_AGENT` - User agent string
//! - `REBOUND_RESTRICT=1|0` - Refuse connections to non-public addresses
//! - `REBOUND_RETRY_STATUS_CODES` - Comma-separated retryable status codes
//! - `REBOUND_ALLOWED_PREFIXES` - Comma-separated CIDR prefixes always allowed
//! - `REBOUND_BLOCKED_PREFIXES` - Comma-separated CIDR prefixes always blocked

use crate::config::ClientConfig;
use http::{HeaderName, HeaderValue};
use ipnet::IpNet;
use rebound_dial::RestrictedDialer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs, io};
use thiserror::Error;

/// Errors raised while loading [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The settings document is not valid TOML for [`Settings`].
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment variable held an unusable value.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidVar {
        /// Variable name.
        name: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A default header could not be represented.
    #[error("invalid default header {name:?}: {reason}")]
    InvalidHeader {
        /// Header name as written.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Serializable client settings.
///
/// Unset fields keep the [`ClientConfig`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Maximum attempts per call. `0` means unlimited.
    pub max_attempts: Option<u32>,
    /// Minimum honored `Retry-After`, in milliseconds.
    pub min_retry_after_ms: Option<u64>,
    /// Maximum honored `Retry-After`, in milliseconds.
    pub max_retry_after_ms: Option<u64>,
    /// Round trip timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connection timeout, in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// User agent string.
    pub user_agent: Option<String>,
    /// Retryable status codes.
    pub retry_status_codes: Option<Vec<u16>>,
    /// Headers added to requests that do not set them.
    pub default_headers: BTreeMap<String, String>,
    /// Refuse connections to non-public addresses.
    pub restrict: bool,
    /// Prefixes that are always allowed when restricting.
    pub allowed_prefixes: Vec<IpNet>,
    /// Prefixes that are always blocked when restricting.
    pub blocked_prefixes: Vec<IpNet>,
}

fn invalid(name: &str, value: &str, reason: impl ToString) -> SettingsError {
    SettingsError::InvalidVar {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e| invalid(name, value, e))
}

fn parse_list<T>(name: &str, value: &str) -> Result<Vec<T>, SettingsError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|e| invalid(name, value, e)))
        .collect()
}

fn parse_flag(name: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(name, value, "expected a boolean")),
    }
}

impl Settings {
    /// Parse settings from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(document)?)
    }

    /// Read settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&document)
    }

    /// Settings from `REBOUND_*` variables in the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::default().with_vars(env::vars())
    }

    /// Settings from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::default().with_vars(vars)
    }

    /// Overlay `REBOUND_*` variables onto these settings. Other variables are
    /// ignored.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in vars {
            let (name, value) = (name.as_ref(), value.as_ref());
            match name {
                "REBOUND_MAX_ATTEMPTS" => self.max_attempts = Some(parse(name, value)?),
                "REBOUND_MIN_RETRY_AFTER_MS" => self.min_retry_after_ms = Some(parse(name, value)?),
                "REBOUND_MAX_RETRY_AFTER_MS" => self.max_retry_after_ms = Some(parse(name, value)?),
                "REBOUND_TIMEOUT_MS" => self.timeout_ms = Some(parse(name, value)?),
                "REBOUND_CONNECT_TIMEOUT_MS" => self.connect_timeout_ms = Some(parse(name, value)?),
                "REBOUND_USER_AGENT" => self.user_agent = Some(value.to_string()),
                "REBOUND_RESTRICT" => self.restrict = parse_flag(name, value)?,
                "REBOUND_RETRY_STATUS_CODES" => {
                    self.retry_status_codes = Some(parse_list(name, value)?)
                }
                "REBOUND_ALLOWED_PREFIXES" => self.allowed_prefixes = parse_list(name, value)?,
                "REBOUND_BLOCKED_PREFIXES" => self.blocked_prefixes = parse_list(name, value)?,
                _ => {}
            }
        }
        Ok(self)
    }

    /// Convert into a client configuration.
    pub fn into_config(self) -> Result<ClientConfig, SettingsError> {
        let mut config = ClientConfig::default();

        if let Some(max) = self.max_attempts {
            config.retry.max_attempts = max;
        }
        if let Some(ms) = self.min_retry_after_ms {
            config.retry.min_retry_after = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_retry_after_ms {
            config.retry.max_retry_after = Duration::from_millis(ms);
        }
        if let Some(codes) = self.retry_status_codes {
            config.retry.retry_status_codes = codes;
        }
        if let Some(ms) = self.timeout_ms {
            config.transport.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.transport.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(agent) = self.user_agent {
            config.transport.user_agent = agent;
        }

        for (name, value) in &self.default_headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SettingsError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| SettingsError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            config.default_headers.append(header, value);
        }

        if self.restrict {
            let mut dialer = RestrictedDialer::new();
            dialer.allowed_prefixes = self.allowed_prefixes;
            dialer.blocked_prefixes = self.blocked_prefixes;
            config.transport.dialer = Some(dialer);
        }

        Ok(config)
    }
}
