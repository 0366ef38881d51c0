use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Store-level failures. `AlreadyInitialized` is a programming error in
/// correct usage: the snapshot is applied exactly once per session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("candidate snapshot already applied")]
    AlreadyInitialized,
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("service url must start with http:// or https://, got '{0}'")]
    InvalidUrl(String),
    #[error("failed to connect vote stream: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("subscriber already opened; resubscribing takes a new instance")]
    AlreadyOpened,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("vote service unavailable: {0}")]
    ServiceUnavailable(#[source] reqwest::Error),
    #[error("vote service rejected the request ({code:?}): {message}")]
    Rejected { code: ErrorCode, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
}

impl ClientError {
    pub(crate) fn rejected(rejection: ApiError) -> Self {
        Self::Rejected {
            code: rejection.code,
            message: rejection.message,
        }
    }
}

/// Why a live-update stream stopped delivering events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called.
    Requested,
    /// The transport terminated on its own. The subscriber takes no further
    /// action; reconnecting is the caller's decision, with a new instance.
    ConnectionLost(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("closed on request"),
            Self::ConnectionLost(detail) => write!(f, "connection lost: {detail}"),
        }
    }
}
