//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use crate::Result;
use crate::error::Error;

/// Environment variable overriding [`Config::api_base_url`]
pub const API_URL_ENV: &str = "MAILSENSE_API_URL";

/// Environment variable overriding [`Config::client_id`]
pub const CLIENT_ID_ENV: &str = "MAILSENSE_CLIENT_ID";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the classify/summarize service
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Google OAuth client id registered for the loopback redirect
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Port of the local OAuth callback listener
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// How long a silent reauthorization may take before it counts as failed
    #[serde(default = "default_silent_timeout_secs")]
    pub silent_timeout_secs: u64,

    /// Page agent retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry settings for talking to the page agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between attempts, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_client_id() -> String {
    "130677489883-ingosll10qjp07ha32fva60247rv6vsc.apps.googleusercontent.com".to_string()
}

fn default_callback_port() -> u16 {
    8085
}

fn default_silent_timeout_secs() -> u64 {
    20
}

fn default_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    333
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            client_id: default_client_id(),
            callback_port: default_callback_port(),
            silent_timeout_secs: default_silent_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn silent_timeout(&self) -> Duration {
        Duration::from_secs(self.silent_timeout_secs)
    }

    /// Apply environment overrides on top of the file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Ok(id) = std::env::var(CLIENT_ID_ENV) {
            if !id.trim().is_empty() {
                self.client_id = id.trim().to_string();
            }
        }
        self
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mailsense")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the persisted extension storage path
pub fn storage_path() -> PathBuf {
    config_dir().join("storage.json")
}

/// Load configuration from file, falling back to defaults when none was written yet
pub fn load() -> Result<Config> {
    let path = config_path();

    let config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)?
    } else {
        tracing::debug!("No config at {:?}, using defaults", path);
        Config::default()
    };

    Ok(config.with_env_overrides())
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    // Create parent directory
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Interactively write the configuration file
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::{Confirm, Text};

    ui::print_header("Setup Wizard");
    println!("  I'll point Mailsense at your summarize service and Google client.\n");

    let mut config = load().unwrap_or_default();

    let api = Text::new("Summarize service base URL:")
        .with_default(&config.api_base_url)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
    config.api_base_url = api.trim().trim_end_matches('/').to_string();

    let custom_client = Confirm::new("Use your own Google OAuth client id?")
        .with_default(false)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;

    if custom_client {
        let id = Text::new("Google OAuth client id:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?;
        if id.trim().is_empty() {
            return Err(Error::Config("Client id cannot be empty".to_string()));
        }
        config.client_id = id.trim().to_string();
    }

    ui::print_step(&format!(
        "Register http://127.0.0.1:{}/callback as a redirect URI for that client",
        config.callback_port
    ));

    ui::print_thinking("Saving configuration");
    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step("Run 'mailsense open --file <email.txt>' to log in and analyze an email.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.callback_port, 8085);
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.retry.delay(), Duration::from_millis(333));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = serde_json::from_str(r#"{"api_base_url": "http://summaries.local"}"#).unwrap();
        assert_eq!(parsed.api_base_url, "http://summaries.local");
        assert_eq!(parsed.silent_timeout_secs, 20);
        assert_eq!(parsed.retry.delay_ms, 333);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.client_id, config.client_id);
    }
}
