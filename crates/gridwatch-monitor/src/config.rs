//! Application configuration.

use crate::error::{AppError, AppResult};
use crate::monitor::MonitorSettings;
use gridwatch_core::Endpoint;
use gridwatch_notify::TelegramConfig;
use gridwatch_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the config file path.
pub const CONFIG_ENV: &str = "GRIDWATCH_CONFIG";

/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/gridwatch.toml";

/// One `[[bots]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEndpointConfig {
    pub label: String,
    /// `host:port` or a full `ws://` / `wss://` URL.
    pub url: String,
}

/// `[reporting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Periodic digest interval in seconds. 0 disables the digest.
    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,

    /// Minimum time between error alerts for the same bot.
    #[serde(default = "default_error_cooldown_secs")]
    pub error_cooldown_secs: u64,

    #[serde(default = "default_startup_notification")]
    pub startup_notification: bool,
}

fn default_periodic_interval_secs() -> u64 {
    3600
}

fn default_error_cooldown_secs() -> u64 {
    60
}

fn default_startup_notification() -> bool {
    true
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            periodic_interval_secs: default_periodic_interval_secs(),
            error_cooldown_secs: default_error_cooldown_secs(),
            startup_notification: default_startup_notification(),
        }
    }
}

/// `[connection]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Backoff floor in seconds.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Backoff ceiling in seconds.
    #[serde(default = "default_max_reconnect_delay_secs")]
    pub max_reconnect_delay_secs: u64,

    /// Keepalive probe interval in seconds.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Pong deadline in seconds.
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    /// Handshake deadline in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_max_reconnect_delay_secs() -> u64 {
    60
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_ping_timeout_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_delay_secs: default_max_reconnect_delay_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ConnectionSettings {
    pub fn to_connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_floor_ms: self.reconnect_delay_secs * 1000,
            reconnect_ceiling_ms: self.max_reconnect_delay_secs * 1000,
            heartbeat_interval_ms: self.ping_interval_secs * 1000,
            heartbeat_timeout_ms: self.ping_timeout_secs * 1000,
            connect_timeout_ms: self.connect_timeout_secs * 1000,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub bots: Vec<BotEndpointConfig>,

    #[serde(default)]
    pub reporting: ReportingConfig,

    #[serde(default)]
    pub connection: ConnectionSettings,
}

impl AppConfig {
    /// Config path: CLI argument, then `GRIDWATCH_CONFIG`, then the default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from a specific file. Telegram credentials from the environment
    /// override the file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        let mut config = Self::parse(&content)?;
        config.telegram.apply_env();
        Ok(config)
    }

    /// Parse TOML text without touching the environment.
    pub fn parse(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.bots.is_empty() {
            return Err(AppError::Config("at least one [[bots]] entry is required".to_string()));
        }

        let mut seen = HashSet::new();
        for bot in &self.bots {
            if bot.label.trim().is_empty() {
                return Err(AppError::Config("bot label must not be empty".to_string()));
            }
            if bot.url.trim().is_empty() {
                return Err(AppError::Config(format!("bot {} has an empty url", bot.label)));
            }
            // Same normalisation as `endpoints`
            if !seen.insert(bot.label.trim()) {
                return Err(AppError::Config(format!(
                    "duplicate bot label: {}",
                    bot.label.trim()
                )));
            }
        }

        let conn = &self.connection;
        if conn.reconnect_delay_secs == 0 {
            return Err(AppError::Config("reconnect_delay_secs must be > 0".to_string()));
        }
        if conn.max_reconnect_delay_secs < conn.reconnect_delay_secs {
            return Err(AppError::Config(
                "max_reconnect_delay_secs must be >= reconnect_delay_secs".to_string(),
            ));
        }
        if conn.ping_interval_secs == 0 {
            return Err(AppError::Config("ping_interval_secs must be > 0".to_string()));
        }
        if conn.ping_timeout_secs == 0 {
            return Err(AppError::Config("ping_timeout_secs must be > 0".to_string()));
        }

        Ok(())
    }

    /// Endpoints in configuration order, with normalised addresses.
    pub fn endpoints(&self) -> AppResult<Vec<Endpoint>> {
        self.bots
            .iter()
            .map(|b| Endpoint::new(b.label.trim(), &b.url).map_err(AppError::from))
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.bots.iter().map(|b| b.label.clone()).collect()
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            periodic_interval: Duration::from_secs(self.reporting.periodic_interval_secs),
            error_cooldown: Duration::from_secs(self.reporting.error_cooldown_secs),
            startup_notification: self.reporting.startup_notification,
            connection: self.connection.to_connection_config(),
            ..MonitorSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[[bots]]
label = "eth-grid"
url = "localhost:9000"
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.reporting.periodic_interval_secs, 3600);
        assert_eq!(config.reporting.error_cooldown_secs, 60);
        assert!(config.reporting.startup_notification);
        assert_eq!(config.connection.reconnect_delay_secs, 5);
        assert_eq!(config.connection.max_reconnect_delay_secs, 60);
        assert_eq!(config.connection.ping_interval_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_normalised() {
        let config = AppConfig::parse(MINIMAL).unwrap();
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints[0].address, "ws://localhost:9000");
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::parse(
            r#"
[telegram]
bot_token = "123:abc"
chat_id = "-100"

[[bots]]
label = "a"
url = "wss://bots.example.com/a"

[[bots]]
label = "b"
url = "10.0.0.2:9000"

[reporting]
periodic_interval_secs = 0
error_cooldown_secs = 120
startup_notification = false

[connection]
reconnect_delay_secs = 2
max_reconnect_delay_secs = 30
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert!(config.telegram.has_credentials());
        assert_eq!(config.labels(), vec!["a".to_string(), "b".to_string()]);

        let settings = config.monitor_settings();
        assert_eq!(settings.periodic_interval, Duration::ZERO);
        assert_eq!(settings.error_cooldown, Duration::from_secs(120));
        assert!(!settings.startup_notification);
        assert_eq!(settings.connection.reconnect_floor_ms, 2000);
        assert_eq!(settings.connection.reconnect_ceiling_ms, 30_000);
        assert_eq!(settings.connection.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_validation_rejects_bad_configs() {
        assert!(AppConfig::parse("").unwrap().validate().is_err());

        let duplicate = r#"
[[bots]]
label = "a"
url = "x:1"
[[bots]]
label = "a"
url = "x:2"
"#;
        assert!(AppConfig::parse(duplicate).unwrap().validate().is_err());

        let padded_duplicate = r#"
[[bots]]
label = "a"
url = "x:1"
[[bots]]
label = "a "
url = "x:2"
"#;
        let err = AppConfig::parse(padded_duplicate).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("duplicate bot label: a"));

        let mut config = AppConfig::parse(MINIMAL).unwrap();
        config.connection.max_reconnect_delay_secs = 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::parse(MINIMAL).unwrap();
        config.connection.ping_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::parse(MINIMAL).unwrap();
        config.bots[0].url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        assert_eq!(
            AppConfig::resolve_path(Some("custom.toml".to_string())),
            "custom.toml"
        );
    }
}
