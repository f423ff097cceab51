use thiserror::Error;

/// Failure of a single delivery attempt.
///
/// Invalid destinations are permanent: retrying the same guest cannot succeed
/// until the destination itself is fixed. Transport and timeout failures are
/// transient and become eligible again on the next run for that stage.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),
    #[error("Send timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl SendError {
    /// Short category string recorded alongside the error message.
    pub fn category(&self) -> &'static str {
        match self {
            SendError::InvalidDestination(_) => "invalid_destination",
            SendError::Timeout(_) => "timeout",
            SendError::Transport(_) => "transport",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SendError::Timeout(_) | SendError::Transport(_))
    }
}

/// Guest directory synchronization failure.
///
/// Sync errors never propagate into dispatch or the RSVP write path; the
/// worker logs them and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Directory returned HTTP {status}: {context}")]
    Remote {
        status: reqwest::StatusCode,
        context: String,
    },
    #[error("Local record missing: {0}")]
    MissingLocal(String),
    #[error("No directory record matches {0}")]
    MissingRemote(String),
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
}
