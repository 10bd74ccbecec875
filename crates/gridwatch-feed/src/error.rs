//! Feed error types.

use gridwatch_core::SummaryKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// A payload for a known kind is missing a required field or has a
    /// field of the wrong type.
    #[error("Parse error ({endpoint}/{kind}): {cause}")]
    Parse {
        endpoint: String,
        kind: String,
        cause: String,
    },

    /// A bot switched summary variant. Protocol violation.
    #[error("Summary kind changed for {endpoint}: {existing} -> {received}")]
    SummaryKindMismatch {
        endpoint: String,
        existing: SummaryKind,
        received: SummaryKind,
    },
}

impl FeedError {
    pub fn parse(endpoint: &str, kind: &str, cause: impl Into<String>) -> Self {
        Self::Parse {
            endpoint: endpoint.to_string(),
            kind: kind.to_string(),
            cause: cause.into(),
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
