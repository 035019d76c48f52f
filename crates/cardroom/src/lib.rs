//! # Cardroom
//!
//! Client-side session synchronization for live, server-authoritative
//! card tables.
//!
//! A [`GameSession`] seats one signed-in user at one game: it keeps a
//! persistent connection up, fans the server's events out into typed
//! channels, mirrors the authoritative game snapshot, tracks who holds
//! host authority, and gates the user's actions before they are sent.
//!
//! ## Layers
//!
//! ```text
//!  cardroom-transport   Connector / Connection, WebSocket, backoff
//!  cardroom-protocol    Game model, event vocabulary, JSON frames
//!  cardroom-session     channels, multiplexer, mirror, authority
//!  cardroom-room        capability-gated dispatch, table rules
//!  cardroom             link task, event loop, GameSession   ← you are here
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardroom::prelude::*;
//!
//! # struct HttpApi;
//! # impl SessionApi for HttpApi {
//! #     async fn fetch_session(&self, game: GameId) -> Result<Game, ApiError> {
//! #         Err(ApiError::NotFound(game))
//! #     }
//! #     async fn leave_session(&self, _game: GameId) -> Result<(), ApiError> {
//! #         Ok(())
//! #     }
//! # }
//! # async fn run() -> Result<(), CardroomError> {
//! let identity = IdentityCell::signed_in(UserId(42));
//! let config = ClientConfig::builder().url("ws://localhost:3000/ws").build();
//!
//! let session = GameSession::open(HttpApi, &identity, GameId(7), config).await?;
//! let _errors = session.events().errors().subscribe(|e| eprintln!("{e}"));
//!
//! session.dispatch(Action::RequestCard);
//! println!("session ended: {:?}", session.closed().await);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod lifecycle;
mod link;
mod pump;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::CardroomError;
pub use lifecycle::{ExitReason, GameSession};
pub use link::{Link, LinkEvent, LinkEvents, LinkState, SocketLink};

/// Everything most clients need, in one import.
pub mod prelude {
    pub use crate::{
        CardroomError, ClientConfig, ExitReason, GameSession, Link, LinkEvent, LinkEvents,
        LinkState, SocketLink,
    };
    pub use cardroom_protocol::{Game, GameId, GameStatus, OutboundEvent, PlayerId, RoomCode, UserId};
    pub use cardroom_room::{Action, ActorView, CreateGame, Dispatch, OutboundSink, Refusal, RoomRules};
    pub use cardroom_session::{
        ApiError, Channel, ErrorEvent, HostAuthority, IdentityCell, SessionApi, Subscription,
    };
    pub use cardroom_transport::{ConnectionId, ReconnectPolicy};
}
