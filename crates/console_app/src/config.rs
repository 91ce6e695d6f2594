use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use console_engine::{RetryPolicy, TransportSettings};
use console_logging::LogDestination;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "console.ron";

pub const ENV_BASE_URL: &str = "TASK_CONSOLE_BASE_URL";
pub const ENV_ADMIN_KEY: &str = "TASK_CONSOLE_ADMIN_KEY";
pub const ENV_TASK_TOKEN: &str = "TASK_CONSOLE_TASK_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogTarget {
    #[default]
    Terminal,
    File,
    Both,
}

/// Settings read from `console.ron`. Every field has a default, so a partial
/// file (or none at all) is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub list_poll_interval_ms: u64,
    pub task_poll_interval_ms: u64,
    pub video_list_poll_interval_ms: u64,
    pub page_size: u32,
    pub retries: u32,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub log_destination: LogTarget,
    pub log_file: PathBuf,
    pub log_level: String,
    pub credentials_path: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            list_poll_interval_ms: 5000,
            task_poll_interval_ms: 2000,
            video_list_poll_interval_ms: 2000,
            page_size: 20,
            retries: 2,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 60_000,
            log_destination: LogTarget::Terminal,
            log_file: PathBuf::from("console.log"),
            log_level: "warn".to_string(),
            credentials_path: PathBuf::from("credentials.ron"),
        }
    }
}

/// Secrets supplied through the environment. They are used for this run
/// only and never written to the credentials file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialOverrides {
    pub admin_key: Option<String>,
    pub task_token: Option<String>,
}

impl ConsoleConfig {
    /// Loads `explicit`, which must exist, or `console.ron` in the working
    /// directory when present, or the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|err| err.to_string())
    }

    /// Applies environment overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> CredentialOverrides
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(base_url) = read(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        CredentialOverrides {
            admin_key: read(ENV_ADMIN_KEY),
            task_token: read(ENV_TASK_TOKEN),
        }
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.list_poll_interval_ms.max(1))
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms.max(1))
    }

    pub fn video_list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.video_list_poll_interval_ms.max(1))
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_retries(self.retries)
    }

    /// Unknown level names fall back to `warn`.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Warn)
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log_destination {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }
}
