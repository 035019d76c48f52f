//! Capability-gated action dispatch.
//!
//! The dispatcher decides one thing: whether to *attempt* an action. It
//! checks the caller's own seat against the action's capability, and only
//! then hands the outbound event to the sink. It never decides the
//! outcome; the server does, and a rejection comes back later as an
//! `error` event.
//!
//! | Action         | Needs                                   |
//! |----------------|-----------------------------------------|
//! | StartGame      | host, and enough non-host members       |
//! | RequestCard    | non-host                                |
//! | SkipTurn       | non-host                                |
//! | Stand          | non-host                                |
//! | RequestReveal  | non-host                                |
//! | DealCard       | host                                    |
//! | Rematch        | host                                    |
//!
//! Without a seat in the game every action is refused.

use std::fmt;

use cardroom_protocol::{Game, OutboundEvent, PlayerId, RoomCode, SelfView, UserId};

use crate::RoomRules;

/// Where dispatched events go. Sending is fire-and-forget.
pub trait OutboundSink: Send + Sync {
    fn send(&self, event: OutboundEvent);
}

impl<S: OutboundSink + ?Sized> OutboundSink for std::sync::Arc<S> {
    fn send(&self, event: OutboundEvent) {
        (**self).send(event);
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// A user-initiated table action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartGame,
    RequestCard,
    SkipTurn,
    Stand,
    RequestReveal,
    DealCard { target: PlayerId },
    Rematch,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartGame => "startGame",
            Self::RequestCard => "requestCard",
            Self::SkipTurn => "skipTurn",
            Self::Stand => "stand",
            Self::RequestReveal => "requestReveal",
            Self::DealCard { .. } => "dealCard",
            Self::Rematch => "rematch",
        }
    }

    /// Whether the action is reserved to the host (`true`) or to
    /// everyone else (`false`).
    pub fn host_only(&self) -> bool {
        matches!(self, Self::StartGame | Self::DealCard { .. } | Self::Rematch)
    }

    fn into_event(self, room_code: RoomCode) -> OutboundEvent {
        match self {
            Self::StartGame => OutboundEvent::StartGame { room_code },
            Self::RequestCard => OutboundEvent::RequestCard { room_code },
            Self::SkipTurn => OutboundEvent::SkipTurn { room_code },
            Self::Stand => OutboundEvent::Stand { room_code },
            Self::RequestReveal => OutboundEvent::RequestReveal { room_code },
            Self::DealCard { target } => OutboundEvent::DealCard {
                room_code,
                target_player_id: target,
            },
            Self::Rematch => OutboundEvent::Rematch { room_code },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ActorView
// ---------------------------------------------------------------------------

/// What the dispatcher knows about the caller, derived from the latest
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorView {
    pub room_code: RoomCode,
    /// The caller's own seat. `None` when the caller is not seated.
    pub me: Option<SelfView>,
    /// Whether the caller may act as host right now. Starts as the
    /// snapshot's flag; authority tracking may override it.
    pub is_host: bool,
    pub non_host_players: usize,
}

impl ActorView {
    /// Derives the view of `user` from `game`.
    pub fn new(game: &Game, user: UserId) -> Self {
        let me = game.self_view(user);
        Self {
            room_code: game.room_code.clone(),
            is_host: me.as_ref().is_some_and(|m| m.is_host),
            me,
            non_host_players: game.non_host_players().count(),
        }
    }

    /// Replaces the host flag with `decide(&me)`. No-op without a seat.
    pub fn with_host(mut self, decide: impl FnOnce(&SelfView) -> bool) -> Self {
        if let Some(me) = &self.me {
            self.is_host = decide(me);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Why an action was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// The caller has no seat in the game.
    NotSeated,
    /// Host-only action from a non-host.
    NotHost,
    /// Non-host action from the host.
    HostCannot,
    /// Start requested with too few non-host members.
    NotEnoughPlayers { seated: usize, needed: usize },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSeated => f.write_str("not seated in this game"),
            Self::NotHost => f.write_str("only the host can do that"),
            Self::HostCannot => f.write_str("the host cannot do that"),
            Self::NotEnoughPlayers { seated, needed } => {
                write!(f, "need {needed} players besides the host, have {seated}")
            }
        }
    }
}

/// Outcome of [`ActionDispatcher::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    Refused(Refusal),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Checks capabilities and forwards permitted actions to a sink.
pub struct ActionDispatcher<S> {
    sink: S,
    rules: RoomRules,
}

impl<S: OutboundSink> ActionDispatcher<S> {
    pub fn new(sink: S, rules: RoomRules) -> Self {
        Self { sink, rules }
    }

    pub fn rules(&self) -> &RoomRules {
        &self.rules
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether `actor` may attempt `action`.
    pub fn check(&self, action: Action, actor: &ActorView) -> Result<(), Refusal> {
        if actor.me.is_none() {
            return Err(Refusal::NotSeated);
        }
        match (action.host_only(), actor.is_host) {
            (true, false) => return Err(Refusal::NotHost),
            (false, true) => return Err(Refusal::HostCannot),
            _ => {}
        }
        if action == Action::StartGame && !self.rules.can_start(actor.non_host_players) {
            return Err(Refusal::NotEnoughPlayers {
                seated: actor.non_host_players,
                needed: self.rules.min_non_host_players,
            });
        }
        Ok(())
    }

    /// Sends `action` for `actor`'s room if the capability check passes.
    ///
    /// A refusal sends nothing. A card request is followed by a
    /// `cardRequestNotification` so the host hears about it.
    pub fn dispatch(&self, action: Action, actor: &ActorView) -> Dispatch {
        if let Err(refusal) = self.check(action, actor) {
            tracing::debug!(
                action = action.name(),
                room_code = %actor.room_code,
                %refusal,
                "action refused locally"
            );
            return Dispatch::Refused(refusal);
        }

        tracing::info!(action = action.name(), room_code = %actor.room_code, "dispatching action");
        self.sink.send(action.into_event(actor.room_code.clone()));

        if action == Action::RequestCard {
            if let Some(SelfView { player_id, username: Some(username), .. }) = &actor.me {
                self.sink.send(OutboundEvent::CardRequestNotification {
                    room_code: actor.room_code.clone(),
                    player_id: *player_id,
                    username: username.clone(),
                });
            }
        }
        Dispatch::Sent
    }
}
