//! The event vocabulary spoken between a client and the game server.
//!
//! Every message on the wire is a [`Frame`]: a named event plus a JSON
//! payload.
//!
//! ```text
//! {"event": "joinGame", "data": {"roomCode": "AB12"}}
//! ```
//!
//! Inbound frames are decoded into [`InboundEvent`]s. The set of inbound
//! names is closed ([`InboundKind`]); a frame with any other name is not
//! an error, it is simply ignored by the caller. Outbound frames are
//! produced from [`OutboundEvent`]s.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Game, PlayerId, ProtocolError, RoomCode, UserId};

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// The envelope around every message: an event name and its payload.
///
/// `data` defaults to `null` so payload-less events can omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

/// Someone sat down at the table.
///
/// The snapshot that reflects the new seat may race this notification,
/// which is why receivers re-fetch the game when they see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoined {
    pub user_id: UserId,
    pub message: String,
}

/// Free-form table chatter: "Ana asked for a card", "Leo dealt to Ana".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAction {
    pub message: String,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub username: Option<String>,
}

/// A player stood (stopped taking cards).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStand {
    pub user_id: UserId,
    pub player_name: String,
    pub room_code: RoomCode,
    pub message: String,
}

/// Host authority moved to another player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostTransferred {
    pub message: String,
    /// `Some(true)` when the original host is expected back.
    #[serde(default)]
    pub is_temporary: Option<bool>,
    #[serde(default)]
    pub new_host_name: Option<String>,
}

/// Host authority went back to the original host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRestored {
    pub message: String,
    #[serde(default)]
    pub original_host_name: Option<String>,
}

/// Everyone is being removed from the table. Terminal for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceLeaveAll {
    pub reason: String,
    pub message: String,
}

/// Acknowledges this client's rematch vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RematchVoteConfirmed {
    pub has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnded {
    pub reason: String,
}

/// The server declined something this client asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
    pub message: String,
}

/// Relayed "a player wants a card" notice meant for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRequestNotice {
    pub player_id: PlayerId,
    pub username: String,
}

// ---------------------------------------------------------------------------
// InboundKind / InboundEvent
// ---------------------------------------------------------------------------

/// The closed set of event names a client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    GameState,
    PlayerJoined,
    PlayerAction,
    PlayerStand,
    HostTransferred,
    HostRestored,
    ForceLeaveAll,
    RematchVoteConfirmed,
    GameEnded,
    Error,
    CardRequestNotification,
}

impl InboundKind {
    pub const ALL: [InboundKind; 11] = [
        Self::GameState,
        Self::PlayerJoined,
        Self::PlayerAction,
        Self::PlayerStand,
        Self::HostTransferred,
        Self::HostRestored,
        Self::ForceLeaveAll,
        Self::RematchVoteConfirmed,
        Self::GameEnded,
        Self::Error,
        Self::CardRequestNotification,
    ];

    /// The wire name of this event.
    pub fn name(self) -> &'static str {
        match self {
            Self::GameState => "gameState",
            Self::PlayerJoined => "playerJoined",
            Self::PlayerAction => "playerAction",
            Self::PlayerStand => "playerStand",
            Self::HostTransferred => "hostTransferred",
            Self::HostRestored => "hostRestored",
            Self::ForceLeaveAll => "forceLeaveAll",
            Self::RematchVoteConfirmed => "rematchVoteConfirmed",
            Self::GameEnded => "gameEnded",
            Self::Error => "error",
            Self::CardRequestNotification => "cardRequestNotification",
        }
    }

    /// Looks a wire name up. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    GameState(Box<Game>),
    PlayerJoined(PlayerJoined),
    PlayerAction(PlayerAction),
    PlayerStand(PlayerStand),
    HostTransferred(HostTransferred),
    HostRestored(HostRestored),
    ForceLeaveAll(ForceLeaveAll),
    RematchVoteConfirmed(RematchVoteConfirmed),
    GameEnded(GameEnded),
    Error(ServerError),
    CardRequestNotification(CardRequestNotice),
}

impl InboundEvent {
    /// Decodes a frame.
    ///
    /// - `Ok(Some(event))`: a known event with a well-formed payload
    /// - `Ok(None)`: an event name outside the vocabulary
    /// - `Err(MalformedPayload)`: a known name whose payload doesn't fit
    pub fn from_frame(frame: Frame) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = InboundKind::from_name(&frame.event) else {
            return Ok(None);
        };
        let data = frame.data;

        let event = match kind {
            InboundKind::GameState => {
                Self::GameState(Box::new(payload(kind, data)?))
            }
            InboundKind::PlayerJoined => Self::PlayerJoined(payload(kind, data)?),
            InboundKind::PlayerAction => Self::PlayerAction(payload(kind, data)?),
            InboundKind::PlayerStand => Self::PlayerStand(payload(kind, data)?),
            InboundKind::HostTransferred => {
                Self::HostTransferred(payload(kind, data)?)
            }
            InboundKind::HostRestored => Self::HostRestored(payload(kind, data)?),
            InboundKind::ForceLeaveAll => {
                Self::ForceLeaveAll(payload(kind, data)?)
            }
            InboundKind::RematchVoteConfirmed => {
                Self::RematchVoteConfirmed(payload(kind, data)?)
            }
            InboundKind::GameEnded => Self::GameEnded(payload(kind, data)?),
            InboundKind::Error => Self::Error(payload(kind, data)?),
            InboundKind::CardRequestNotification => {
                Self::CardRequestNotification(payload(kind, data)?)
            }
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> InboundKind {
        match self {
            Self::GameState(_) => InboundKind::GameState,
            Self::PlayerJoined(_) => InboundKind::PlayerJoined,
            Self::PlayerAction(_) => InboundKind::PlayerAction,
            Self::PlayerStand(_) => InboundKind::PlayerStand,
            Self::HostTransferred(_) => InboundKind::HostTransferred,
            Self::HostRestored(_) => InboundKind::HostRestored,
            Self::ForceLeaveAll(_) => InboundKind::ForceLeaveAll,
            Self::RematchVoteConfirmed(_) => InboundKind::RematchVoteConfirmed,
            Self::GameEnded(_) => InboundKind::GameEnded,
            Self::Error(_) => InboundKind::Error,
            Self::CardRequestNotification(_) => {
                InboundKind::CardRequestNotification
            }
        }
    }
}

fn payload<T: DeserializeOwned>(
    kind: InboundKind,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| {
        ProtocolError::MalformedPayload {
            event: kind.name(),
            source,
        }
    })
}

// ---------------------------------------------------------------------------
// OutboundEvent
// ---------------------------------------------------------------------------

/// Everything a client can send.
///
/// `#[serde(tag = "event", content = "data")]` produces exactly the
/// [`Frame`] shape, so serializing an `OutboundEvent` yields a ready-to-send
/// frame:
///
/// ```rust
/// use cardroom_protocol::{OutboundEvent, RoomCode};
///
/// let event = OutboundEvent::JoinGame { room_code: RoomCode::new("AB12") };
/// let json = serde_json::to_string(&event).unwrap();
/// assert_eq!(json, r#"{"event":"joinGame","data":{"roomCode":"AB12"}}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum OutboundEvent {
    /// First frame on every connection.
    Authenticate { user_id: UserId },
    JoinGame { room_code: RoomCode },
    StartGame { room_code: RoomCode },
    RequestCard { room_code: RoomCode },
    SkipTurn { room_code: RoomCode },
    Stand { room_code: RoomCode },
    RequestReveal { room_code: RoomCode },
    DealCard {
        room_code: RoomCode,
        target_player_id: PlayerId,
    },
    Rematch { room_code: RoomCode },
    LeaveGame { room_code: RoomCode },
    /// Relays "I want a card" to the host.
    CardRequestNotification {
        room_code: RoomCode,
        player_id: PlayerId,
        username: String,
    },
}

impl OutboundEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::JoinGame { .. } => "joinGame",
            Self::StartGame { .. } => "startGame",
            Self::RequestCard { .. } => "requestCard",
            Self::SkipTurn { .. } => "skipTurn",
            Self::Stand { .. } => "stand",
            Self::RequestReveal { .. } => "requestReveal",
            Self::DealCard { .. } => "dealCard",
            Self::Rematch { .. } => "rematch",
            Self::LeaveGame { .. } => "leaveGame",
            Self::CardRequestNotification { .. } => "cardRequestNotification",
        }
    }

    /// The room this event targets. Only `authenticate` has none.
    pub fn room_code(&self) -> Option<&RoomCode> {
        match self {
            Self::Authenticate { .. } => None,
            Self::JoinGame { room_code }
            | Self::StartGame { room_code }
            | Self::RequestCard { room_code }
            | Self::SkipTurn { room_code }
            | Self::Stand { room_code }
            | Self::RequestReveal { room_code }
            | Self::DealCard { room_code, .. }
            | Self::Rematch { room_code }
            | Self::LeaveGame { room_code }
            | Self::CardRequestNotification { room_code, .. } => Some(room_code),
        }
    }
}
