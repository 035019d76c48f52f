//! The game data model mirrored by every client.
//!
//! A [`Game`] is the authoritative snapshot the server pushes on every
//! relevant mutation (join, turn change, deal, reveal). Clients never patch
//! it field by field; they swap the whole value, so these types are plain
//! data with a few read-only helpers.
//!
//! Field names follow the wire contract, which is camelCase JSON:
//! `roomCode`, `currentTurnPlayerId`, `isHost`, and so on.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The authenticated user's id.
///
/// Established once per process before connecting and never changes for
/// the life of the process. `#[serde(transparent)]` keeps it a plain number
/// on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A player's id *within one game*.
///
/// Not the same thing as [`UserId`]: the same user gets a different
/// `PlayerId` in every game they sit down at. Turn references, winners
/// and deal targets all use this id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The server-side id of a game, used by the request/response API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// The short, human-shareable key of a game ("AB12").
///
/// Immutable for the life of a game and used to address every outbound
/// action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a game as reported by the server.
///
/// ```text
/// Waiting → Playing → Finished
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Seats are open; the host has not started yet.
    #[default]
    Waiting,
    /// Cards are being dealt and turns taken.
    Playing,
    /// A winner (or none) has been decided.
    Finished,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cards and players
// ---------------------------------------------------------------------------

/// One card held by a player.
///
/// Cards the viewer is not allowed to see arrive with `is_visible == false`
/// and without suit/value; only the holder (or everyone, after a reveal)
/// gets the face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerCard {
    pub id: u64,
    pub suit: Option<String>,
    pub value: Option<String>,
    pub numeric_value: Option<i32>,
    pub image_data: Option<String>,
    pub filename: Option<String>,
    /// Position of this card in the order it was dealt.
    pub order_received: u32,
    pub is_visible: bool,
}

/// One participant's entry in a game.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub user_id: UserId,
    pub username: String,
    /// Seat position around the table.
    pub position: u32,
    pub is_host: bool,
    pub wants_cards: bool,
    pub has_requested_reveal: bool,
    /// `None` until the game is finished.
    pub total_score: Option<i64>,
    pub is_eliminated: bool,
    pub is_current_turn: Option<bool>,
    pub card_count: Option<u32>,
    pub cards: Vec<PlayerCard>,
}

/// The server's own summary of the receiving user's seat.
///
/// Present only on snapshots addressed to a seated user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPlayer {
    pub id: PlayerId,
    pub position: u32,
    pub is_host: bool,
    pub wants_cards: bool,
    pub has_requested_reveal: bool,
    pub total_score: Option<i64>,
    pub is_current_turn: bool,
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A complete, self-consistent snapshot of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: GameId,
    pub room_code: RoomCode,
    pub status: GameStatus,
    #[serde(default)]
    pub current_turn_player_id: Option<PlayerId>,
    #[serde(default)]
    pub min_players: u32,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub cards_revealed: bool,
    #[serde(default)]
    pub winner_id: Option<PlayerId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Seated players, in seat order.
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub user_player: Option<UserPlayer>,
}

impl Game {
    /// Players without the host flag. These are the seats that count
    /// towards the minimum needed to start.
    pub fn non_host_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_host)
    }

    /// The player currently flagged as host, if any.
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn player_for_user(&self, user: UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user)
    }

    /// Derives the viewing user's own seat.
    ///
    /// Looks the user up in `players` first and falls back to the
    /// server-provided `userPlayer` block. Returns `None` when the user is
    /// not seated in this game.
    pub fn self_view(&self, user: UserId) -> Option<SelfView> {
        if let Some(player) = self.player_for_user(user) {
            let is_current_turn = self.current_turn_player_id
                == Some(player.id)
                || player.is_current_turn.unwrap_or(false);
            return Some(SelfView {
                player_id: player.id,
                user_id: user,
                username: Some(player.username.clone()),
                position: player.position,
                is_host: player.is_host,
                is_current_turn,
                wants_cards: player.wants_cards,
                has_requested_reveal: player.has_requested_reveal,
            });
        }

        self.user_player.as_ref().map(|up| SelfView {
            player_id: up.id,
            user_id: user,
            username: None,
            position: up.position,
            is_host: up.is_host,
            is_current_turn: up.is_current_turn
                || self.current_turn_player_id == Some(up.id),
            wants_cards: up.wants_cards,
            has_requested_reveal: up.has_requested_reveal,
        })
    }
}

/// The viewing user's own seat, cached for capability checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfView {
    pub player_id: PlayerId,
    pub user_id: UserId,
    /// Display name, when the seat was found in the player list.
    pub username: Option<String>,
    pub position: u32,
    pub is_host: bool,
    pub is_current_turn: bool,
    pub wants_cards: bool,
    pub has_requested_reveal: bool,
}
