//! Notification delivery and message formatting for gridwatch.
//!
//! - `NotificationGateway`: what the monitor calls to notify the operator
//! - `formatter`: HTML text rendering of bot snapshots
//! - `TelegramGateway` / `StatusPoller`: Telegram Bot API delivery and
//!   the `/status` command interface
//! - `LogGateway`, `RecordingGateway`: log-only and test gateways

pub mod config;
pub mod error;
pub mod formatter;
pub mod gateway;
pub mod poller;
pub mod telegram;

pub use config::TelegramConfig;
pub use error::{NotifyError, NotifyResult};
pub use gateway::{
    BoxFuture, DigestEntry, DynGateway, LogGateway, Notification, NotificationGateway,
    RecordingGateway,
};
pub use poller::{Command, StatusPoller};
pub use telegram::{split_message, TelegramClient, TelegramGateway, MAX_MESSAGE_LENGTH};
