//! Who holds host authority right now, and whether this session is still
//! valid.
//!
//! Host authority can move mid-game. When the host drops, the server may
//! hand authority to another player, temporarily or for good, and later
//! hand it back:
//!
//! ```text
//!                     hostTransferred(isTemporary)
//!   Primary ─────────────────────────────────────────► TemporarilyDelegated
//!     ▲  │                                                     │
//!     │  │ hostTransferred(!isTemporary)                       │
//!     │  ▼                                                     │
//!     │ Transferred                                            │
//!     │  │                                                     │
//!     └──┴──────────────── hostRestored ◄──────────────────────┘
//! ```
//!
//! A `forceLeaveAll` ends everything: the tracker records the eviction and
//! ignores any authority change after it.
//!
//! The holder's name is advisory. When the tracker knows it, "am I host"
//! is answered by comparing it with the viewer's username; otherwise the
//! snapshot's own `isHost` flag decides.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cardroom_protocol::{ForceLeaveAll, HostRestored, HostTransferred, SelfView};

use crate::channel::{Channel, Subscription};
use crate::multiplexer::EventMultiplexer;

/// The current host-authority phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAuthority {
    /// The original host holds authority. The name is known once a
    /// restore has named them.
    Primary { host_name: Option<String> },
    /// Someone stands in for an absent host.
    TemporarilyDelegated { delegate_name: Option<String> },
    /// Authority moved for good.
    Transferred { new_host_name: Option<String> },
}

impl Default for HostAuthority {
    fn default() -> Self {
        Self::Primary { host_name: None }
    }
}

impl HostAuthority {
    /// Name of whoever holds authority, if the server told us.
    pub fn holder_name(&self) -> Option<&str> {
        match self {
            Self::Primary { host_name } => host_name.as_deref(),
            Self::TemporarilyDelegated { delegate_name } => delegate_name.as_deref(),
            Self::Transferred { new_host_name } => new_host_name.as_deref(),
        }
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self, Self::TemporarilyDelegated { .. })
    }
}

/// Why the server ended the session for everyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct TrackerState {
    authority: HostAuthority,
    eviction: Option<Eviction>,
}

/// Tracks host authority and session validity.
pub struct AuthorityTracker {
    state: Mutex<TrackerState>,
    changes: Channel<HostAuthority>,
}

impl Default for AuthorityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorityTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            changes: Channel::new("authority"),
        }
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follows `hostTransferred`, `hostRestored` and `forceLeaveAll` on `mux`.
    pub fn attach(self: &Arc<Self>, mux: &EventMultiplexer) -> Vec<Subscription> {
        let on_transfer = Arc::clone(self);
        let on_restore = Arc::clone(self);
        let on_evict = Arc::clone(self);
        vec![
            mux.host_transferred()
                .subscribe(move |e| on_transfer.on_transfer(e)),
            mux.host_restored().subscribe(move |e| on_restore.on_restored(e)),
            mux.force_leave_all().subscribe(move |e| on_evict.on_eviction(e)),
        ]
    }

    /// Applies a `hostTransferred` event.
    pub fn on_transfer(&self, event: &HostTransferred) {
        let next = if event.is_temporary.unwrap_or(false) {
            HostAuthority::TemporarilyDelegated {
                delegate_name: event.new_host_name.clone(),
            }
        } else {
            HostAuthority::Transferred {
                new_host_name: event.new_host_name.clone(),
            }
        };
        self.apply(next);
    }

    /// Applies a `hostRestored` event.
    pub fn on_restored(&self, event: &HostRestored) {
        self.apply(HostAuthority::Primary {
            host_name: event.original_host_name.clone(),
        });
    }

    /// Records a `forceLeaveAll`. The first eviction wins.
    pub fn on_eviction(&self, event: &ForceLeaveAll) {
        let mut state = self.state();
        if state.eviction.is_some() {
            return;
        }
        tracing::info!(reason = %event.reason, "session evicted by server");
        state.eviction = Some(Eviction {
            reason: event.reason.clone(),
            message: event.message.clone(),
        });
    }

    fn apply(&self, next: HostAuthority) {
        {
            let mut state = self.state();
            if state.eviction.is_some() {
                tracing::debug!(?next, "ignoring authority change after eviction");
                return;
            }
            if state.authority == next {
                return;
            }
            tracing::info!(from = ?state.authority, to = ?next, "host authority changed");
            state.authority = next.clone();
        }
        self.changes.publish(&next);
    }

    pub fn current(&self) -> HostAuthority {
        self.state().authority.clone()
    }

    pub fn eviction(&self) -> Option<Eviction> {
        self.state().eviction.clone()
    }

    pub fn is_evicted(&self) -> bool {
        self.state().eviction.is_some()
    }

    /// `false` once the server has evicted everyone.
    pub fn is_valid(&self) -> bool {
        !self.is_evicted()
    }

    /// Whether `me` may act as host.
    ///
    /// Uses the tracked holder name when there is one; falls back to the
    /// snapshot flag otherwise, or when the viewer's own name is unknown.
    pub fn effective_is_host(&self, me: &SelfView) -> bool {
        let state = self.state();
        match (state.authority.holder_name(), me.username.as_deref()) {
            (Some(holder), Some(name)) => holder == name,
            _ => me.is_host,
        }
    }

    /// Fires on every actual authority change.
    pub fn changes(&self) -> &Channel<HostAuthority> {
        &self.changes
    }

    pub fn close(&self) {
        self.changes.close();
    }
}
