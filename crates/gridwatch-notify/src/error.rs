//! Notification error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("Delivery failed for {failed} of {total} message chunks")]
    PartialDelivery { failed: usize, total: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
