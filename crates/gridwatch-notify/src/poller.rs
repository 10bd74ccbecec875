//! Telegram command interface.
//!
//! Long-polls `getUpdates` and answers `/status`, `/status <label>` and
//! `/help` from the configured chat. State is read through
//! `SnapshotSource` only.

use crate::formatter;
use crate::telegram::{TelegramClient, Update};
use gridwatch_feed::SnapshotSource;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Wait after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Recognised bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/status` or `/status <label>`
    Status(Option<String>),
    Help,
}

impl Command {
    /// Parse a message text. Accepts the `/cmd@BotName` form.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head);
        match name {
            "status" => Some(Self::Status(parts.next().map(str::to_string))),
            "help" | "start" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Answers status commands until cancelled.
pub struct StatusPoller {
    client: Arc<TelegramClient>,
    chat_id: String,
    source: Arc<dyn SnapshotSource>,
    poll_timeout_secs: u64,
    shutdown_token: CancellationToken,
}

impl StatusPoller {
    pub fn new(
        client: Arc<TelegramClient>,
        chat_id: impl Into<String>,
        source: Arc<dyn SnapshotSource>,
        poll_timeout_secs: u64,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
            source,
            poll_timeout_secs,
            shutdown_token,
        }
    }

    /// Reply text for a command.
    pub fn respond(&self, command: &Command) -> String {
        match command {
            Command::Help => formatter::format_help(),
            Command::Status(None) => formatter::format_status_all(&self.source.get_all_snapshots()),
            Command::Status(Some(label)) => match self.source.get_snapshot(label) {
                Some(snapshot) => formatter::format_bot_status(&snapshot),
                None => formatter::format_unknown_bot(label, &self.source.labels()),
            },
        }
    }

    /// Reply for one update, or `None` when it is not ours to answer.
    pub fn handle_update(&self, update: &Update) -> Option<String> {
        let message = update.message.as_ref()?;
        if message.chat.id.to_string() != self.chat_id {
            debug!(chat_id = message.chat.id, "Ignoring message from unknown chat");
            return None;
        }
        let command = Command::parse(message.text.as_deref()?)?;
        debug!(?command, "Telegram command received");
        Some(self.respond(&command))
    }

    /// Poll loop. Returns when the shutdown token is cancelled.
    pub async fn run(&self) {
        info!("Telegram command polling started");
        let mut offset = 0i64;

        loop {
            let poll = self.client.get_updates(offset, self.poll_timeout_secs);
            let updates = tokio::select! {
                biased;
                () = self.shutdown_token.cancelled() => break,
                result = poll => result,
            };

            match updates {
                Ok(updates) => {
                    for update in &updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(reply) = self.handle_update(update) {
                            if let Err(e) = self.client.send_text(&self.chat_id, &reply).await {
                                warn!(error = %e, "Failed to answer command");
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Telegram getUpdates failed");
                    tokio::select! {
                        () = self.shutdown_token.cancelled() => break,
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                    }
                }
            }
        }

        info!("Telegram command polling stopped");
    }
}
