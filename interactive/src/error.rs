use pickboard_shared::{stats::SeriesError, InvalidTopic, VoteRejected};
use thiserror::Error;

/// Everything a backend call can end in.
///
/// `Clone` so that one refresh failure can be handed to every request that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The refresh failed for a signed-in user, who has already been told.
    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("not authenticated: {0}")]
    Unauthenticated(String),

    #[error("login required")]
    LoginRequired,

    #[error("already voted on this topic")]
    AlreadyVoted,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    /// Errors that mean "log in again" to the user.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            ApiError::LoginRequired | ApiError::Unauthenticated(_) | ApiError::SessionExpired(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

impl From<VoteRejected> for ApiError {
    fn from(err: VoteRejected) -> Self {
        match err {
            VoteRejected::AlreadyVoted => ApiError::AlreadyVoted,
            other => ApiError::Invalid(other.to_string()),
        }
    }
}

impl From<InvalidTopic> for ApiError {
    fn from(err: InvalidTopic) -> Self {
        ApiError::Invalid(err.to_string())
    }
}

impl From<SeriesError> for ApiError {
    fn from(err: SeriesError) -> Self {
        ApiError::Decode(err.to_string())
    }
}
