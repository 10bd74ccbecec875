//! Telegram Bot API delivery.
//!
//! Messages are sent with HTML parse mode. Text longer than Telegram's limit
//! is split at line boundaries and sent as consecutive messages. Failures
//! are logged and returned; nothing is retried.

use crate::config::TelegramConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::formatter;
use crate::gateway::{BoxFuture, DigestEntry, NotificationGateway};
use gridwatch_feed::BotSnapshot;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Telegram message length limit.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Extra time allowed on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Incoming update from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Thin Bot API client shared by the gateway and the command poller.
pub struct TelegramClient {
    client: Client,
    /// `{api_base_url}/bot{token}`
    base_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NotifyError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_base_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    /// Send one message (must already fit the length limit).
    pub async fn send_message(&self, chat_id: &str, text: &str) -> NotifyResult<()> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::HttpClient(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        let body: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| NotifyError::HttpClient(format!("Failed to parse response: {e}")))?;

        if !status.is_success() || !body.ok {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                description: body.description.unwrap_or_default(),
            });
        }

        debug!(chat_id, len = text.len(), "Telegram message sent");
        Ok(())
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> NotifyResult<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };

        let response = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .timeout(Duration::from_secs(timeout_secs) + POLL_GRACE)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::HttpClient(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| NotifyError::HttpClient(format!("Failed to parse response: {e}")))?;

        if !status.is_success() || !body.ok {
            return Err(NotifyError::Api {
                status: status.as_u16(),
                description: body.description.unwrap_or_default(),
            });
        }

        Ok(body.result.unwrap_or_default())
    }

    /// Send `text`, split into chunks if needed.
    ///
    /// Every chunk is attempted; the error reports how many failed.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> NotifyResult<()> {
        let chunks = split_message(text);
        if chunks.len() == 1 {
            return self.send_message(chat_id, &chunks[0]).await.map_err(|e| {
                error!(error = %e, "Failed to send Telegram message");
                e
            });
        }

        let total = chunks.len();
        let mut failed = 0;
        for chunk in &chunks {
            if let Err(e) = self.send_message(chat_id, chunk).await {
                error!(error = %e, "Failed to send Telegram chunk");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(NotifyError::PartialDelivery { failed, total });
        }
        Ok(())
    }
}

/// Split text into chunks of at most `MAX_MESSAGE_LENGTH` characters,
/// breaking at line boundaries. A single line longer than the limit is
/// hard-split.
pub fn split_message(text: &str) -> Vec<String> {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        for piece in hard_split(line) {
            let piece_len = piece.chars().count();
            if current_len + piece_len + 1 > MAX_MESSAGE_LENGTH && !current.is_empty() {
                chunks.push(current.trim_end().to_string());
                current.clear();
                current_len = 0;
            }
            current.push_str(&piece);
            current.push('\n');
            current_len += piece_len + 1;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

fn hard_split(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() < MAX_MESSAGE_LENGTH {
        return vec![line.to_string()];
    }
    chars
        .chunks(MAX_MESSAGE_LENGTH - 1)
        .map(|c| c.iter().collect())
        .collect()
}

/// Gateway delivering to one Telegram chat.
pub struct TelegramGateway {
    client: std::sync::Arc<TelegramClient>,
    chat_id: String,
}

impl TelegramGateway {
    pub fn new(client: std::sync::Arc<TelegramClient>, chat_id: impl Into<String>) -> Self {
        let chat_id = chat_id.into();
        info!(chat_id = %chat_id, "Telegram gateway configured");
        Self { client, chat_id }
    }
}

impl NotificationGateway for TelegramGateway {
    fn send_startup(&self, labels: Vec<String>) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            let text = formatter::format_startup(&labels);
            self.client.send_text(&self.chat_id, &text).await
        })
    }

    fn send_initial_summary(
        &self,
        _label: String,
        snapshot: BotSnapshot,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            let text = formatter::format_initial_summary(&snapshot);
            self.client.send_text(&self.chat_id, &text).await
        })
    }

    fn send_error_alert(
        &self,
        label: String,
        message: String,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            let text = formatter::format_error_alert(&label, &message);
            self.client.send_text(&self.chat_id, &text).await
        })
    }

    fn send_periodic_digest(
        &self,
        entries: Vec<DigestEntry>,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            if entries.is_empty() {
                return Ok(());
            }
            let text = formatter::format_digest(&entries);
            self.client.send_text(&self.chat_id, &text).await
        })
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
