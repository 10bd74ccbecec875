//! Telegram credentials and polling settings.

use serde::{Deserialize, Serialize};

pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// `[telegram]` section.
///
/// Credentials may be left empty in the file and supplied through
/// `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`; the environment wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    #[serde(default)]
    pub chat_id: String,

    /// Bot API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Answer `/status` and `/help` commands.
    #[serde(default = "default_commands_enabled")]
    pub commands_enabled: bool,

    /// Long-poll timeout for `getUpdates` in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// HTTP timeout for `sendMessage` in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_commands_enabled() -> bool {
    true
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base_url: default_api_base_url(),
            commands_enabled: default_commands_enabled(),
            poll_timeout_secs: default_poll_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TelegramConfig {
    /// Apply credential overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply credential overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.bot_token = token.trim().to_string();
        }
        if let Some(chat_id) = lookup(CHAT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.chat_id = chat_id.trim().to_string();
        }
    }

    /// True when both credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.chat_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_file() {
        let mut cfg = TelegramConfig {
            bot_token: "file-token".to_string(),
            chat_id: "111".to_string(),
            ..Default::default()
        };
        cfg.apply_overrides(|key| match key {
            TOKEN_ENV => Some("env-token".to_string()),
            _ => None,
        });
        assert_eq!(cfg.bot_token, "env-token");
        assert_eq!(cfg.chat_id, "111");
        assert!(cfg.has_credentials());
    }

    #[test]
    fn test_empty_env_ignored() {
        let mut cfg = TelegramConfig::default();
        cfg.apply_overrides(|_| Some("  ".to_string()));
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let cfg: TelegramConfig =
            serde_json::from_value(serde_json::json!({"bot_token": "t", "chat_id": "1"})).unwrap();
        assert_eq!(cfg.api_base_url, "https://api.telegram.org");
        assert_eq!(cfg.poll_timeout_secs, 30);
        assert!(cfg.commands_enabled);
    }
}
