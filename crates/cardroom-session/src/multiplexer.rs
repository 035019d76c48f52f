//! Typed fan-out of inbound server events.
//!
//! The [`EventMultiplexer`] owns one [`Channel`] per event kind. Decoded
//! frames come in through [`EventMultiplexer::route_frame`] (or
//! [`deliver`](EventMultiplexer::deliver) for already-decoded events) and
//! go out to whichever subscribers are listening right now.
//!
//! ```text
//!   text frame ──► Codec ──► InboundEvent ──► per-kind Channel ──► handlers
//!                    │
//!                    └── unknown name / bad payload → dropped (debug log)
//! ```
//!
//! Two channels carry client-side facts rather than server events:
//! `errors` (transport faults, refused actions, API failures) and
//! `connected` (a new transport connection is up).

use cardroom_protocol::{
    Codec, ForceLeaveAll, Frame, Game, GameEnded, HostRestored,
    HostTransferred, InboundEvent, InboundKind, PlayerAction, PlayerJoined,
    PlayerStand, RematchVoteConfirmed,
};
use cardroom_transport::ConnectionId;

use crate::channel::Channel;
use crate::error::ErrorEvent;

/// One channel per event kind.
pub struct EventMultiplexer {
    game_state: Channel<Game>,
    player_joined: Channel<PlayerJoined>,
    player_action: Channel<PlayerAction>,
    player_stand: Channel<PlayerStand>,
    host_transferred: Channel<HostTransferred>,
    host_restored: Channel<HostRestored>,
    force_leave_all: Channel<ForceLeaveAll>,
    rematch_vote_confirmed: Channel<RematchVoteConfirmed>,
    game_ended: Channel<GameEnded>,
    errors: Channel<ErrorEvent>,
    connected: Channel<ConnectionId>,
}

impl Default for EventMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMultiplexer {
    pub fn new() -> Self {
        Self {
            game_state: Channel::new("gameState"),
            player_joined: Channel::new("playerJoined"),
            player_action: Channel::new("playerAction"),
            player_stand: Channel::new("playerStand"),
            host_transferred: Channel::new("hostTransferred"),
            host_restored: Channel::new("hostRestored"),
            force_leave_all: Channel::new("forceLeaveAll"),
            rematch_vote_confirmed: Channel::new("rematchVoteConfirmed"),
            game_ended: Channel::new("gameEnded"),
            errors: Channel::new("errors"),
            connected: Channel::new("connected"),
        }
    }

    // -----------------------------------------------------------------------
    // Channels
    // -----------------------------------------------------------------------

    pub fn game_state(&self) -> &Channel<Game> {
        &self.game_state
    }

    pub fn player_joined(&self) -> &Channel<PlayerJoined> {
        &self.player_joined
    }

    /// Narrated table actions. Card-request notices arrive here too,
    /// rewritten into a human-readable message.
    pub fn player_action(&self) -> &Channel<PlayerAction> {
        &self.player_action
    }

    pub fn player_stand(&self) -> &Channel<PlayerStand> {
        &self.player_stand
    }

    pub fn host_transferred(&self) -> &Channel<HostTransferred> {
        &self.host_transferred
    }

    pub fn host_restored(&self) -> &Channel<HostRestored> {
        &self.host_restored
    }

    pub fn force_leave_all(&self) -> &Channel<ForceLeaveAll> {
        &self.force_leave_all
    }

    pub fn rematch_vote_confirmed(&self) -> &Channel<RematchVoteConfirmed> {
        &self.rematch_vote_confirmed
    }

    pub fn game_ended(&self) -> &Channel<GameEnded> {
        &self.game_ended
    }

    pub fn errors(&self) -> &Channel<ErrorEvent> {
        &self.errors
    }

    pub fn connected(&self) -> &Channel<ConnectionId> {
        &self.connected
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Decodes one text frame and delivers it.
    ///
    /// Returns the kind that was delivered, or `None` when the frame was
    /// dropped (unknown event name, malformed frame or payload).
    pub fn route_frame<C: Codec>(&self, codec: &C, text: &str) -> Option<InboundKind> {
        let frame: Frame = match codec.decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed frame");
                return None;
            }
        };
        let name = frame.event.clone();

        match InboundEvent::from_frame(frame) {
            Ok(Some(event)) => Some(self.deliver(event)),
            Ok(None) => {
                tracing::debug!(event = %name, "dropping unknown event");
                None
            }
            Err(e) => {
                tracing::debug!(event = %name, error = %e, "dropping malformed payload");
                None
            }
        }
    }

    /// Publishes a decoded event on its channel and returns its kind.
    pub fn deliver(&self, event: InboundEvent) -> InboundKind {
        let kind = event.kind();
        tracing::trace!(event = kind.name(), "routing inbound event");

        match event {
            InboundEvent::GameState(game) => {
                self.game_state.publish(&*game);
            }
            InboundEvent::PlayerJoined(e) => {
                self.player_joined.publish(&e);
            }
            InboundEvent::PlayerAction(e) => {
                self.player_action.publish(&e);
            }
            InboundEvent::PlayerStand(e) => {
                self.player_stand.publish(&e);
            }
            InboundEvent::HostTransferred(e) => {
                self.host_transferred.publish(&e);
            }
            InboundEvent::HostRestored(e) => {
                self.host_restored.publish(&e);
            }
            InboundEvent::ForceLeaveAll(e) => {
                self.force_leave_all.publish(&e);
            }
            InboundEvent::RematchVoteConfirmed(e) => {
                self.rematch_vote_confirmed.publish(&e);
            }
            InboundEvent::GameEnded(e) => {
                self.game_ended.publish(&e);
            }
            InboundEvent::Error(e) => {
                self.errors.publish(&ErrorEvent::Rejected(e.message));
            }
            InboundEvent::CardRequestNotification(notice) => {
                let action = PlayerAction {
                    message: format!(
                        "Player {} requested a card. Use the deal button to hand one out.",
                        notice.username
                    ),
                    player_id: Some(notice.player_id),
                    username: Some(notice.username),
                };
                self.player_action.publish(&action);
            }
        }
        kind
    }

    /// Reports a client-side failure on the `errors` channel.
    pub fn report(&self, error: ErrorEvent) {
        tracing::debug!(error = %error, "reporting session error");
        self.errors.publish(&error);
    }

    /// Announces that a transport connection is up.
    pub fn announce_connected(&self, id: ConnectionId) {
        self.connected.publish(&id);
    }

    /// Drops every subscriber on every channel. Nothing is delivered
    /// afterwards. Idempotent.
    pub fn close(&self) {
        self.game_state.close();
        self.player_joined.close();
        self.player_action.close();
        self.player_stand.close();
        self.host_transferred.close();
        self.host_restored.close();
        self.force_leave_all.close();
        self.rematch_vote_confirmed.close();
        self.game_ended.close();
        self.errors.close();
        self.connected.close();
    }

    pub fn is_closed(&self) -> bool {
        self.errors.is_closed()
    }
}
