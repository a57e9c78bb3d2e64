//! Console configuration
//!
//! Settings come from, in increasing precedence:
//! - built-in defaults
//! - an optional TOML file (`--config` / `SMSGATE_CONFIG`)
//! - command-line flags and `SMSGATE_*` environment variables
//!
//! The primary API URL has no default; it must be set somewhere.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Gateway management endpoint, when it is separate from the primary API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Resolved console settings
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Primary API base URL (auth, users, groups)
    pub api_url: String,
    pub gateway: Option<GatewayConfig>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Refresh period of `watch`
    pub poll_interval: Duration,
    /// Where the session record lives
    pub data_dir: PathBuf,
}

/// On-disk layout of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    gateway: Option<GatewayConfig>,
    timeout_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    data_dir: Option<PathBuf>,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub gateway_url: Option<String>,
    pub gateway_username: Option<String>,
    pub gateway_password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

impl AdminConfig {
    /// Settings with defaults everywhere except the API URL
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            gateway: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            data_dir: PathBuf::from("./data"),
        }
    }

    /// Read the optional file, then apply overrides
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content)?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }

    pub fn from_toml_str(content: &str, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve(toml::from_str(content)?, overrides)
    }

    fn resolve(file: FileConfig, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let api_url = overrides
            .api_url
            .or(file.api_url)
            .ok_or(ConfigError::Missing("api_url (SMSGATE_API_URL)"))?;
        let api_url = normalize_url("api_url", &api_url)?;

        let mut gateway = file.gateway;
        if let Some(url) = overrides.gateway_url {
            match gateway.as_mut() {
                Some(gateway) => gateway.url = url,
                None => {
                    gateway = Some(GatewayConfig {
                        url,
                        username: None,
                        password: None,
                    })
                }
            }
        }
        if let Some(gateway) = gateway.as_mut() {
            gateway.url = normalize_url("gateway.url", &gateway.url)?;
            if overrides.gateway_username.is_some() {
                gateway.username = overrides.gateway_username;
            }
            if overrides.gateway_password.is_some() {
                gateway.password = overrides.gateway_password;
            }
        }

        let timeout_secs = overrides
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        let poll_interval_secs = overrides
            .poll_interval_secs
            .or(file.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "poll_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }

        let data_dir = overrides
            .data_dir
            .or(file.data_dir)
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            api_url,
            gateway,
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            data_dir,
        })
    }
}

fn normalize_url(name: &'static str, url: &str) -> Result<String, ConfigError> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("'{}' must start with http:// or https://", url),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

/// Data directory: `~/.smsgate` when the home directory is usable, else `./data`
///
/// `SMSGATE_DATA_DIR` is handled by the CLI layer as an override.
pub fn default_data_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        let dir = home.join(".smsgate");
        if std::fs::create_dir_all(&dir).is_ok() {
            return dir;
        }
    }

    let local_dir = PathBuf::from("./data");
    let _ = std::fs::create_dir_all(&local_dir);
    local_dir
}
