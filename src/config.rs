//! User settings, read from a TOML file.
//!
//! The default file lives in the platform config directory:
//! - Linux: `~/.config/pda-assist/config.toml`
//! - Windows: `%APPDATA%\pda-assist\config\config.toml`
//! - macOS: `~/Library/Application Support/com.obody.pda-assist/config.toml`
//!
//! Every field has a default, so a partial (or missing) file is fine.

use crate::statics;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "obody";
const APP_NAME: &str = "pda-assist";
const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub editing: EditingConfig,
    pub favorites: FavoritesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: statics::DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: statics::DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        millis_or_default(self.request_timeout_ms, statics::DEFAULT_REQUEST_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub drift_interval_ms: u64,
    pub liveness_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            drift_interval_ms: statics::DEFAULT_DRIFT_INTERVAL_MS,
            liveness_interval_ms: statics::DEFAULT_LIVENESS_INTERVAL_MS,
        }
    }
}

impl PollingConfig {
    /// Never zero, even when the fields were set in code: `tokio::time::interval`
    /// panics on a zero period.
    pub fn drift_interval(&self) -> Duration {
        millis_or_default(self.drift_interval_ms, statics::DEFAULT_DRIFT_INTERVAL_MS)
    }

    pub fn liveness_interval(&self) -> Duration {
        millis_or_default(self.liveness_interval_ms, statics::DEFAULT_LIVENESS_INTERVAL_MS)
    }
}

fn millis_or_default(ms: u64, default: u64) -> Duration {
    Duration::from_millis(if ms == 0 { default } else { ms })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Start with raw-text editing enabled.
    pub manual_edit: bool,
    pub edit_cooldown_ms: u64,
    pub push_debounce_ms: u64,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            manual_edit: false,
            edit_cooldown_ms: statics::DEFAULT_EDIT_COOLDOWN_MS,
            push_debounce_ms: statics::DEFAULT_PUSH_DEBOUNCE_MS,
        }
    }
}

impl EditingConfig {
    pub fn edit_cooldown(&self) -> Duration {
        Duration::from_millis(self.edit_cooldown_ms)
    }

    pub fn push_debounce(&self) -> Duration {
        Duration::from_millis(self.push_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoritesConfig {
    pub pinned_presets: Vec<String>,
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            pinned_presets: statics::DEFAULT_PINNED_PRESETS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Path of the default config file, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

impl AssistConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: AssistConfig = toml::from_str(text).context("invalid config file")?;
        config.sanitize();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// An explicit path must exist; the default path may be missing.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            None => {
                debug!("no config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Zero intervals would spin the pollers.
    fn sanitize(&mut self) {
        let defaults = PollingConfig::default();
        if self.polling.drift_interval_ms == 0 {
            self.polling.drift_interval_ms = defaults.drift_interval_ms;
        }
        if self.polling.liveness_interval_ms == 0 {
            self.polling.liveness_interval_ms = defaults.liveness_interval_ms;
        }
        if self.server.request_timeout_ms == 0 {
            self.server.request_timeout_ms = statics::DEFAULT_REQUEST_TIMEOUT_MS;
        }
        let trimmed = self.server.base_url.trim_end_matches('/').len();
        self.server.base_url.truncate(trimmed);
    }
}
