//! Wire protocol for Cardroom.
//!
//! This crate defines the "language" a card-table client and its server
//! speak:
//!
//! - **Types** ([`Game`], [`Player`], [`PlayerCard`], ids): the game
//!   snapshot every client mirrors.
//! - **Events** ([`InboundEvent`], [`OutboundEvent`], [`Frame`]): the
//!   fixed vocabulary of named events and their payloads.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames are turned
//!   into text and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (events) → Session (channels, mirror)
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{
    CardRequestNotice, ForceLeaveAll, Frame, GameEnded, HostRestored,
    HostTransferred, InboundEvent, InboundKind, OutboundEvent, PlayerAction,
    PlayerJoined, PlayerStand, RematchVoteConfirmed, ServerError,
};
pub use types::{
    Game, GameId, GameStatus, Player, PlayerCard, PlayerId, RoomCode,
    SelfView, UserId, UserPlayer,
};
