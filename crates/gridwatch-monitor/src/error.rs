//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] gridwatch_core::CoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] gridwatch_feed::FeedError),

    #[error("Notification error: {0}")]
    Notify(#[from] gridwatch_notify::NotifyError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] gridwatch_telemetry::TelemetryError),

    #[error("Monitor already running")]
    AlreadyRunning,
}

pub type AppResult<T> = Result<T, AppError>;
