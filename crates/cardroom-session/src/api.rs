//! The request/response half of the game API.
//!
//! Loading the initial snapshot and recording a departure are plain
//! request/response calls, not socket events. Cardroom doesn't implement
//! them; it defines the [`SessionApi`] trait and the lifecycle calls it.
//! An HTTP client implements it in production, a mock in tests.

use cardroom_protocol::{Game, GameId};

use crate::ApiError;

/// Loads and leaves games.
///
/// `Send + Sync + 'static` because the session shares one instance
/// between its own tasks.
///
/// # Example
///
/// ```rust
/// use cardroom_protocol::{Game, GameId};
/// use cardroom_session::{ApiError, SessionApi};
///
/// /// Knows no games at all.
/// struct EmptyLobby;
///
/// impl SessionApi for EmptyLobby {
///     async fn fetch_session(&self, game: GameId) -> Result<Game, ApiError> {
///         Err(ApiError::NotFound(game))
///     }
///
///     async fn leave_session(&self, game: GameId) -> Result<(), ApiError> {
///         Err(ApiError::NotFound(game))
///     }
/// }
/// ```
pub trait SessionApi: Send + Sync + 'static {
    /// Fetches the authoritative snapshot of `game`.
    fn fetch_session(
        &self,
        game: GameId,
    ) -> impl std::future::Future<Output = Result<Game, ApiError>> + Send;

    /// Records that the viewing user leaves `game`.
    fn leave_session(
        &self,
        game: GameId,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

impl<T: SessionApi> SessionApi for std::sync::Arc<T> {
    fn fetch_session(
        &self,
        game: GameId,
    ) -> impl std::future::Future<Output = Result<Game, ApiError>> + Send {
        (**self).fetch_session(game)
    }

    fn leave_session(
        &self,
        game: GameId,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send {
        (**self).leave_session(game)
    }
}
