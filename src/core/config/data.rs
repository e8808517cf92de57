use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::io::ConfigError;
use crate::utils::url::normalize_base_url;

/// Where the chat service lives unless told otherwise.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Environment override for the service base URL.
pub const API_URL_ENV: &str = "CREDITCHAT_API_URL";

pub const KEY_API_URL: &str = "api-url";
pub const KEY_REQUEST_TIMEOUT: &str = "request-timeout";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the chat service, e.g. "https://chat.example.org/api"
    pub api_base_url: Option<String>,
    /// Per-request timeout in seconds; the transport default applies when unset
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Pick the base URL: command line, then environment, then this file,
    /// then the built-in default.
    pub fn resolve_base_url(&self, cli_override: Option<&str>) -> String {
        let env_value = std::env::var(API_URL_ENV).ok();
        self.resolve_base_url_with(cli_override, env_value.as_deref())
    }

    pub(crate) fn resolve_base_url_with(
        &self,
        cli_override: Option<&str>,
        env_value: Option<&str>,
    ) -> String {
        [cli_override, env_value, self.api_base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(normalize_base_url)
            .find(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Apply a `set <key> <value>` from the command line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key {
            KEY_API_URL => {
                let url = normalize_base_url(value);
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.api_base_url = Some(url);
            }
            KEY_REQUEST_TIMEOUT => {
                let secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                self.request_timeout_secs = Some(secs);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match key {
            KEY_API_URL => self.api_base_url = None,
            KEY_REQUEST_TIMEOUT => self.request_timeout_secs = None,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
