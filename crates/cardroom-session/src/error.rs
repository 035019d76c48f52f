//! Error types for the session layer.

use cardroom_protocol::GameId;

/// Failures of the request/response game API (the collaborator that
/// loads a session snapshot and records a departure).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The game does not exist (or is no longer visible to this user).
    #[error("game {0} not found")]
    NotFound(GameId),

    /// The API answered, but refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The API could not be reached or answered garbage.
    #[error("game API unavailable: {0}")]
    Unavailable(String),
}

/// A non-fatal failure surfaced on the session's `errors` channel.
///
/// None of these end the session by themselves. A connection failure is
/// retried by the link; a rejected action or API failure is just
/// reported to whoever listens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorEvent {
    /// The connection could not be opened, dropped, or was not up when a
    /// send was attempted.
    #[error("{0}")]
    Transport(String),

    /// The server's `error` event: an action it refused.
    #[error("{0}")]
    Rejected(String),

    /// The game API failed, e.g. while recording a departure.
    #[error("{0}")]
    Api(String),
}

impl ErrorEvent {
    /// The error a failed connection attempt is reported as.
    pub fn connect_failed(detail: impl std::fmt::Display) -> Self {
        Self::Transport(format!("Failed to connect to WebSocket server: {detail}"))
    }

    /// Human-readable text, as shown to the user.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport(m) | Self::Rejected(m) | Self::Api(m) => m,
        }
    }
}

impl From<ApiError> for ErrorEvent {
    fn from(err: ApiError) -> Self {
        Self::Api(err.to_string())
    }
}
