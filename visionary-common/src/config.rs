//! Configuration loading
//!
//! Every setting resolves in the same order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VISIONARY_*`)
//! 3. TOML config file (`~/.config/visionary/store.toml` or `--config`)
//! 4. Compiled default
//!
//! A missing or unreadable config file never stops startup; it is logged and
//! treated as empty.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chat::DEFAULT_WELCOME;
use crate::{Error, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5740;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const ENV_BACKEND_URL: &str = "VISIONARY_BACKEND_URL";
pub const ENV_BACKEND_KEY: &str = "VISIONARY_BACKEND_KEY";
pub const ENV_GEMINI_API_KEY: &str = "VISIONARY_GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "VISIONARY_GEMINI_MODEL";
pub const ENV_GEMINI_BASE_URL: &str = "VISIONARY_GEMINI_BASE_URL";
pub const ENV_ADMIN_PASSCODE: &str = "VISIONARY_ADMIN_PASSCODE";
pub const ENV_BIND: &str = "VISIONARY_BIND";
pub const ENV_PORT: &str = "VISIONARY_PORT";
pub const ENV_REQUEST_TIMEOUT: &str = "VISIONARY_REQUEST_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL: &str = "VISIONARY_POLL_INTERVAL_SECS";
pub const ENV_CONTACT_HANDLE: &str = "VISIONARY_CONTACT_HANDLE";
pub const ENV_WELCOME_MESSAGE: &str = "VISIONARY_WELCOME_MESSAGE";

/// Contents of `store.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
    pub admin_passcode: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub request_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub contact_handle: Option<String>,
    pub welcome_message: Option<String>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend_url: Option<String>,
    pub backend_key: Option<String>,
    pub admin_passcode: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub poll_interval_secs: Option<u64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend_url: String,
    pub backend_key: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Empty disables the admin gate
    pub admin_passcode: String,
    pub bind: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    /// 0 = poller off
    pub poll_interval_secs: u64,
    /// Shown until the settings table provides one
    pub contact_handle: String,
    pub welcome_message: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            backend_key: String::new(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            admin_passcode: String::new(),
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: 0,
            contact_handle: String::new(),
            welcome_message: DEFAULT_WELCOME.to_string(),
        }
    }
}

impl StoreConfig {
    /// Resolve CLI > ENV > TOML > default for every field
    pub fn resolve(cli: &ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = StoreConfig::default();

        Ok(Self {
            backend_url: pick(cli.backend_url.clone(), ENV_BACKEND_URL, toml.backend_url.clone())?
                .unwrap_or(defaults.backend_url),
            backend_key: pick(cli.backend_key.clone(), ENV_BACKEND_KEY, toml.backend_key.clone())?
                .unwrap_or(defaults.backend_key),
            gemini_api_key: pick(None, ENV_GEMINI_API_KEY, toml.gemini_api_key.clone())?
                .filter(|k: &String| !k.trim().is_empty()),
            gemini_model: pick(None, ENV_GEMINI_MODEL, toml.gemini_model.clone())?
                .unwrap_or(defaults.gemini_model),
            gemini_base_url: pick(None, ENV_GEMINI_BASE_URL, toml.gemini_base_url.clone())?
                .unwrap_or(defaults.gemini_base_url),
            admin_passcode: pick(cli.admin_passcode.clone(), ENV_ADMIN_PASSCODE, toml.admin_passcode.clone())?
                .unwrap_or(defaults.admin_passcode),
            bind: pick(cli.bind.clone(), ENV_BIND, toml.bind.clone())?.unwrap_or(defaults.bind),
            port: pick(cli.port, ENV_PORT, toml.port)?.unwrap_or(defaults.port),
            request_timeout_secs: pick(None, ENV_REQUEST_TIMEOUT, toml.request_timeout_secs)?
                .unwrap_or(defaults.request_timeout_secs),
            poll_interval_secs: pick(cli.poll_interval_secs, ENV_POLL_INTERVAL, toml.poll_interval_secs)?
                .unwrap_or(defaults.poll_interval_secs),
            contact_handle: pick(None, ENV_CONTACT_HANDLE, toml.contact_handle.clone())?
                .unwrap_or(defaults.contact_handle),
            welcome_message: pick(None, ENV_WELCOME_MESSAGE, toml.welcome_message.clone())?
                .unwrap_or(defaults.welcome_message),
        })
    }

    /// Backend credentials look usable
    ///
    /// The URL must be https and the key must look like a JWT (`ey...`);
    /// anything else is treated as "not configured".
    pub fn is_backend_configured(&self) -> bool {
        self.backend_url.trim().starts_with("https://") && self.backend_key.trim().starts_with("ey")
    }

    pub fn admin_gate_enabled(&self) -> bool {
        !self.admin_passcode.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// First present value in priority order; blank env vars are ignored
fn pick<T: FromStr>(cli: Option<T>, env_name: &str, toml: Option<T>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    if cli.is_some() {
        return Ok(cli);
    }

    if let Ok(raw) = std::env::var(env_name) {
        let raw = raw.trim();
        if !raw.is_empty() {
            return raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| Error::Config(format!("Invalid value for {}: {}", env_name, e)));
        }
    }

    Ok(toml)
}

/// `~/.config/visionary/store.toml` (platform config dir)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("visionary").join("store.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the explicit or default config file, falling back to an empty config
pub fn load_toml_or_default(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory; using defaults");
            return TomlConfig::default();
        }
    };

    if explicit.is_none() && !path.exists() {
        info!("No config file at {}; using environment and defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using environment and defaults", e);
            TomlConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_configured_check() {
        let mut config = StoreConfig::default();
        assert!(!config.is_backend_configured());

        config.backend_url = "https://abc.supabase.co".into();
        config.backend_key = "eyJhbGciOi".into();
        assert!(config.is_backend_configured());

        config.backend_url = "http://abc.supabase.co".into();
        assert!(!config.is_backend_configured());

        config.backend_url = "https://abc.supabase.co".into();
        config.backend_key = "YOUR_KEY".into();
        assert!(!config.is_backend_configured());
    }

    #[test]
    fn test_poll_interval_zero_is_off() {
        let mut config = StoreConfig::default();
        assert_eq!(config.poll_interval(), None);
        config.poll_interval_secs = 5;
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_toml_parse_partial() {
        let config: TomlConfig = toml::from_str("port = 8080\nadmin_passcode = \"1234\"").unwrap();
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.admin_passcode.as_deref(), Some("1234"));
        assert_eq!(config.backend_url, None);
    }
}
