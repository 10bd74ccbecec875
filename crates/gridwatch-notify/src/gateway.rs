//! Notification gateway trait.
//!
//! The monitor calls these methods and only logs failures. This allows for:
//! - Telegram delivery in production
//! - Log-only delivery when no credentials are configured
//! - Recording in tests

use crate::error::NotifyResult;
use crate::formatter;
use gridwatch_core::Delta;
use gridwatch_feed::BotSnapshot;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One bot's line in a periodic digest.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub label: String,
    /// State at digest time, with the baseline the delta was computed from.
    pub snapshot: BotSnapshot,
    /// `None` when the bot has not reported a summary yet.
    pub delta: Option<Delta>,
}

/// Outward notification channel.
pub trait NotificationGateway: Send + Sync {
    /// One-time startup message listing the watched labels.
    fn send_startup(&self, labels: Vec<String>) -> BoxFuture<'_, NotifyResult<()>>;

    /// First data received from a bot.
    fn send_initial_summary(
        &self,
        label: String,
        snapshot: BotSnapshot,
    ) -> BoxFuture<'_, NotifyResult<()>>;

    /// Error reported by a bot (already cooldown-filtered).
    fn send_error_alert(&self, label: String, message: String)
        -> BoxFuture<'_, NotifyResult<()>>;

    /// Consolidated periodic digest.
    fn send_periodic_digest(&self, entries: Vec<DigestEntry>)
        -> BoxFuture<'_, NotifyResult<()>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn NotificationGateway>;

/// Gateway that writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogGateway;

impl NotificationGateway for LogGateway {
    fn send_startup(&self, labels: Vec<String>) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            info!(labels = ?labels, "Monitor started");
            Ok(())
        })
    }

    fn send_initial_summary(
        &self,
        label: String,
        snapshot: BotSnapshot,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            info!(
                label = %label,
                summary = %formatter::format_bot_status(&snapshot),
                "First data from bot"
            );
            Ok(())
        })
    }

    fn send_error_alert(
        &self,
        label: String,
        message: String,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            info!(label = %label, message = %message, "Bot error alert");
            Ok(())
        })
    }

    fn send_periodic_digest(
        &self,
        entries: Vec<DigestEntry>,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            for entry in &entries {
                match &entry.delta {
                    Some(delta) => info!(
                        label = %entry.label,
                        connected = entry.snapshot.connected,
                        new_roundtrips = delta.new_roundtrips,
                        matched_delta = %delta.matched_delta,
                        fees_delta = %delta.fees_delta,
                        "Periodic digest"
                    ),
                    None => info!(
                        label = %entry.label,
                        connected = entry.snapshot.connected,
                        "Periodic digest (no data yet)"
                    ),
                }
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A notification captured by `RecordingGateway`.
#[derive(Debug, Clone)]
pub enum Notification {
    Startup(Vec<String>),
    InitialSummary { label: String, snapshot: BotSnapshot },
    ErrorAlert { label: String, message: String },
    Digest(Vec<DigestEntry>),
}

impl Notification {
    /// Short kind name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Startup(_) => "startup",
            Self::InitialSummary { .. } => "initial_summary",
            Self::ErrorAlert { .. } => "error_alert",
            Self::Digest(_) => "digest",
        }
    }

    /// Hand this notification to `gateway`.
    pub fn send_via<'a>(
        self,
        gateway: &'a dyn NotificationGateway,
    ) -> BoxFuture<'a, NotifyResult<()>> {
        match self {
            Self::Startup(labels) => gateway.send_startup(labels),
            Self::InitialSummary { label, snapshot } => gateway.send_initial_summary(label, snapshot),
            Self::ErrorAlert { label, message } => gateway.send_error_alert(label, message),
            Self::Digest(entries) => gateway.send_periodic_digest(entries),
        }
    }
}

/// Gateway that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get recorded notifications.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn error_alerts(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::ErrorAlert { label, message } => {
                    Some((label.clone(), message.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn initial_summaries(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::InitialSummary { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn digests(&self) -> Vec<Vec<DigestEntry>> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Digest(entries) => Some(entries.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    fn record(&self, notification: Notification) {
        self.sent.lock().push(notification);
    }
}

impl NotificationGateway for RecordingGateway {
    fn send_startup(&self, labels: Vec<String>) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            self.record(Notification::Startup(labels));
            Ok(())
        })
    }

    fn send_initial_summary(
        &self,
        label: String,
        snapshot: BotSnapshot,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            self.record(Notification::InitialSummary { label, snapshot });
            Ok(())
        })
    }

    fn send_error_alert(
        &self,
        label: String,
        message: String,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            self.record(Notification::ErrorAlert { label, message });
            Ok(())
        })
    }

    fn send_periodic_digest(
        &self,
        entries: Vec<DigestEntry>,
    ) -> BoxFuture<'_, NotifyResult<()>> {
        Box::pin(async move {
            self.record(Notification::Digest(entries));
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
