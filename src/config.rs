use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{trace, warn};

const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_BOT_TOKEN";
const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID";

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Not read; accepted so existing config files stay valid
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Minimum seconds between two delivered alerts of the same signal
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown: f64,

    /// Length cap of both process rankings
    #[serde(default = "default_top_processes")]
    pub top_processes: usize,

    #[serde(default = "crate::util::get_default_socket_path")]
    pub socket_path: PathBuf,

    /// Mount point whose usage is reported as disk usage
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Thresholds {
    #[serde(default = "default_cpu_percent")]
    pub cpu_percent: f64,

    #[serde(default = "default_memory_percent")]
    pub memory_percent: f64,

    #[serde(default = "default_disk_percent")]
    pub disk_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            thresholds: Thresholds::default(),
            check_interval: default_check_interval(),
            alert_cooldown: default_alert_cooldown(),
            top_processes: default_top_processes(),
            socket_path: crate::util::get_default_socket_path(),
            disk_path: default_disk_path(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: PLACEHOLDER_BOT_TOKEN.to_string(),
            chat_id: PLACEHOLDER_CHAT_ID.to_string(),
            api_url: default_telegram_api_url(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: default_cpu_percent(),
            memory_percent: default_memory_percent(),
            disk_percent: default_disk_percent(),
        }
    }
}

impl TelegramConfig {
    /// Credentials are usable when both are present and not the generated placeholders.
    pub fn is_configured(&self) -> bool {
        let token = self.bot_token.trim();
        let chat = self.chat_id.trim();
        !token.is_empty()
            && !chat.is_empty()
            && token != PLACEHOLDER_BOT_TOKEN
            && chat != PLACEHOLDER_CHAT_ID
    }
}

fn default_check_interval() -> u64 {
    5
}

fn default_alert_cooldown() -> f64 {
    300.0
}

fn default_top_processes() -> usize {
    5
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("/")
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_cpu_percent() -> f64 {
    90.0
}

fn default_memory_percent() -> f64 {
    85.0
}

fn default_disk_percent() -> f64 {
    90.0
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Write the default configuration so an operator can fill in credentials.
pub fn write_default_config(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let config = Config::default();
    let content = serde_json::to_string_pretty(&config)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(config)
}

/// Configuration that is re-read from disk on every access.
///
/// A missing file means defaults. A broken file keeps the last good configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    path: Option<PathBuf>,
    current: Config,
}

impl ConfigHandle {
    pub fn from_file(path: impl Into<PathBuf>, initial: Config) -> Self {
        Self {
            path: Some(path.into()),
            current: initial,
        }
    }

    /// A handle that never reloads.
    pub fn fixed(config: Config) -> Self {
        Self {
            path: None,
            current: config,
        }
    }

    pub fn current(&self) -> &Config {
        &self.current
    }

    pub fn reload(&mut self) -> &Config {
        let Some(path) = &self.path else {
            return &self.current;
        };

        if !path.exists() {
            self.current = Config::default();
            return &self.current;
        }

        match read_config_file(path) {
            Ok(config) => self.current = config,
            Err(e) => warn!("keeping previous configuration: {e:#}"),
        }

        &self.current
    }
}
