//! The local mirror of the server's game.
//!
//! The server is authoritative. The client never patches its copy field
//! by field: every `gameState` event (and every re-fetched snapshot)
//! replaces the mirror wholesale, and whatever is derived from it (the
//! viewer's own seat, the non-host count) is recomputed from the new
//! snapshot by whoever reads it.
//!
//! ```text
//!  gameState ─┐
//!             ├─► StateReconciler::replace ─► latest() / updates channel
//!  re-fetch ──┘
//! ```
//!
//! [`ResyncGate`] coalesces re-fetches: while one is in flight, further
//! requests only mark it dirty, and exactly one follow-up fetch runs once
//! it completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cardroom_protocol::Game;

use crate::channel::{Channel, Subscription};
use crate::multiplexer::EventMultiplexer;

/// Holds the latest authoritative snapshot.
pub struct StateReconciler {
    latest: Mutex<Option<Arc<Game>>>,
    version: AtomicU64,
    updates: Channel<Arc<Game>>,
}

impl Default for StateReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl StateReconciler {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            version: AtomicU64::new(0),
            updates: Channel::new("snapshot"),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Game>>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirrors every `gameState` event published on `mux`.
    #[must_use = "the mirror stops updating when the subscription drops"]
    pub fn attach(self: &Arc<Self>, mux: &EventMultiplexer) -> Subscription {
        let me = Arc::clone(self);
        mux.game_state().subscribe(move |game| {
            me.replace(game.clone());
        })
    }

    /// Replaces the mirror with `game` and notifies `updates` subscribers.
    pub fn replace(&self, game: Game) -> Arc<Game> {
        let game = Arc::new(game);
        *self.slot() = Some(Arc::clone(&game));
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;

        tracing::debug!(
            game = %game.id,
            room = %game.room_code,
            status = ?game.status,
            players = game.players.len(),
            version,
            "snapshot replaced"
        );
        self.updates.publish(&game);
        game
    }

    /// The latest snapshot, or `None` before the first one arrived.
    pub fn latest(&self) -> Option<Arc<Game>> {
        self.slot().clone()
    }

    /// How many snapshots have been applied so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Fires after every replacement, with the new snapshot.
    pub fn updates(&self) -> &Channel<Arc<Game>> {
        &self.updates
    }

    /// Forgets the mirror and stops notifying. Used when the session ends.
    pub fn clear(&self) {
        self.updates.close();
        self.slot().take();
    }
}

// ---------------------------------------------------------------------------
// ResyncGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    InFlight,
    /// In flight, and another request arrived meanwhile.
    InFlightDirty,
}

/// Coalesces overlapping snapshot re-fetches.
///
/// ```text
///            request()=true          complete()=false
///   Idle ──────────────────► InFlight ─────────────────► Idle
///                              │  ▲
///                   request()  │  │ complete()=true (fetch again)
///                              ▼  │
///                          InFlightDirty ◄── request() (no-op)
/// ```
#[derive(Debug)]
pub struct ResyncGate {
    state: Mutex<GateState>,
}

impl Default for ResyncGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ResyncGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks for a re-fetch. Returns `true` if the caller should start one
    /// now; `false` if one is already running (it will be repeated).
    pub fn request(&self) -> bool {
        let mut state = self.state();
        match *state {
            GateState::Idle => {
                *state = GateState::InFlight;
                true
            }
            GateState::InFlight | GateState::InFlightDirty => {
                *state = GateState::InFlightDirty;
                false
            }
        }
    }

    /// Marks the running fetch done. Returns `true` if requests arrived
    /// meanwhile and the caller should fetch once more.
    pub fn complete(&self) -> bool {
        let mut state = self.state();
        match *state {
            GateState::InFlightDirty => {
                *state = GateState::InFlight;
                true
            }
            GateState::InFlight | GateState::Idle => {
                *state = GateState::Idle;
                false
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        *self.state() == GateState::Idle
    }
}
