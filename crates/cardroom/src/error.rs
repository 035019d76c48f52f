//! Unified error type for Cardroom clients.

use std::time::Duration;

use cardroom_protocol::GameId;
use cardroom_room::RuleError;
use cardroom_session::ApiError;

/// Errors a Cardroom client gets back from the facade.
///
/// Only the edges of a session return errors: starting it, leaving it,
/// validating a create-game request. Anything that goes wrong while a
/// session runs is reported on its `errors` channel instead.
#[derive(Debug, thiserror::Error)]
pub enum CardroomError {
    /// The request/response game API failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A request broke the local table rules.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// Nobody signed in within the allowed time.
    #[error("no signed-in user after {0:?}")]
    NotAuthenticated(Duration),

    /// The first snapshot of the game never arrived.
    #[error("failed to load game {game}: {reason}")]
    LoadFailed { game: GameId, reason: String },

    /// The session already ended.
    #[error("session is closed")]
    Closed,
}
