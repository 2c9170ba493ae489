//! Sync configuration.
//!
//! Values come from an optional JSON file and are then overridden by the
//! environment. The bearer token is only ever read from the environment so
//! it never lands in a file on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::MonitorConfig;
use crate::sync::SyncEngineConfig;
use crate::util::{is_http_url, normalize_text_option};

pub const API_URL_ENV: &str = "DAYBOOK_API_URL";
pub const API_TOKEN_ENV: &str = "DAYBOOK_API_TOKEN";
pub const USER_ID_ENV: &str = "DAYBOOK_USER_ID";

const CONFIG_DIR_NAME: &str = "daybook";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Remote store base URL; sync is disabled without it
    pub api_base_url: Option<String>,
    #[serde(skip)]
    pub api_token: Option<String>,
    pub user_id: Option<String>,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub probe_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub log_retention_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            user_id: None,
            sync_interval_secs: 300,
            request_timeout_secs: 30,
            probe_interval_secs: 30,
            probe_timeout_secs: 5,
            max_retries: 3,
            retry_backoff_ms: 500,
            log_retention_days: 30,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_id", &self.user_id)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("probe_interval_secs", &self.probe_interval_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("log_retention_days", &self.log_retention_days)
            .finish()
    }
}

impl SyncConfig {
    /// `<config_dir>/daybook/config.json` for the current platform
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path` (or the default location) and the
    /// process environment.
    ///
    /// An explicit `path` must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        Self::from_json(&raw)
            .map_err(|error| Error::Config(format!("{}: {error}", path.display())))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.api_base_url = normalize_text_option(config.api_base_url.take());
        config.user_id = normalize_text_option(config.user_id.take());
        Ok(config)
    }

    /// Apply environment-style overrides; blank values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = normalize_text_option(lookup(API_URL_ENV)) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = normalize_text_option(lookup(API_TOKEN_ENV)) {
            self.api_token = Some(token);
        }
        if let Some(user_id) = normalize_text_option(lookup(USER_ID_ENV)) {
            self.user_id = Some(user_id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api_base_url {
            if !is_http_url(url) {
                return Err(Error::Config(
                    "api_base_url must include http:// or https://".to_string(),
                ));
            }
        }

        let intervals = [
            ("sync_interval_secs", self.sync_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("probe_interval_secs", self.probe_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
        ];
        if let Some((field, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(Error::Config(format!("{field} must be greater than zero")));
        }
        Ok(())
    }

    pub const fn sync_enabled(&self) -> bool {
        self.api_base_url.is_some()
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub const fn engine_config(&self) -> SyncEngineConfig {
        SyncEngineConfig {
            request_timeout: self.request_timeout(),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            log_retention_days: self.log_retention_days,
        }
    }

    pub const fn monitor_config(&self, initially_online: bool) -> MonitorConfig {
        MonitorConfig {
            probe_interval: Duration::from_secs(self.probe_interval_secs),
            probe_timeout: self.probe_timeout(),
            initially_online,
        }
    }
}
