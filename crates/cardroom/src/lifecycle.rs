//! `GameSession`: one user seated at one game, for as long as it lasts.
//!
//! Starting a session runs a fixed sequence:
//!
//! ```text
//!  1. wait for a signed-in identity      (bounded: identity_timeout)
//!  2. link.connect(identity)             → authenticate goes out first
//!  3. fetch the first snapshot           (bounded: load_timeout)
//!  4. wire mirror, authority, re-fetch and eviction handlers
//!  5. send joinGame
//!  6. spawn the event loop
//! ```
//!
//! From then on the session runs until one of:
//!
//! - [`GameSession::leave`] succeeds          → `ExitReason::Left`
//! - the server sends `forceLeaveAll`         → `ExitReason::Evicted`
//! - [`GameSession::close`] or drop           → `ExitReason::Closed`
//! - the link gives up reconnecting           → `ExitReason::LinkLost`
//!
//! Every path goes through one teardown: release all subscriptions, close
//! every channel, call `disconnect()` exactly once. A second teardown is a
//! no-op, and teardown may be triggered from inside an event handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use cardroom_protocol::{Game, GameId, JsonCodec, OutboundEvent, RoomCode, UserId};
use cardroom_room::{Action, ActionDispatcher, ActorView, Dispatch, OutboundSink, Refusal};
use cardroom_session::{
    ApiError, AuthorityTracker, Channel, ErrorEvent, EventMultiplexer, HostAuthority,
    IdentityCell, ResyncGate, SessionApi, StateReconciler, SubscriptionSet,
};
use cardroom_transport::{ConnectionId, WebSocketConnector};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::link::{Link, LinkEvents, SocketLink};
use crate::pump::{self, LoopEvent};
use crate::{CardroomError, ClientConfig};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The user left and the server recorded it.
    Left,
    /// The server ended the game for everyone.
    Evicted { reason: String, message: String },
    /// Closed locally.
    Closed,
    /// The connection could not be kept up.
    LinkLost,
}

// ---------------------------------------------------------------------------
// SessionInner
// ---------------------------------------------------------------------------

/// Which connection `joinGame` last went out on.
#[derive(Debug, Default)]
struct JoinState {
    requested: bool,
    joined_on: Option<ConnectionId>,
}

/// State shared between the handle, the event loop and event handlers.
pub(crate) struct SessionInner<L: Link, A: SessionApi> {
    game_id: GameId,
    room_code: RoomCode,
    user: UserId,
    load_timeout: Duration,
    link: Arc<L>,
    api: Arc<A>,
    codec: JsonCodec,
    mux: EventMultiplexer,
    reconciler: Arc<StateReconciler>,
    authority: Arc<AuthorityTracker>,
    dispatcher: ActionDispatcher<Arc<L>>,
    resync: Arc<ResyncGate>,
    join: Mutex<JoinState>,
    subscriptions: Mutex<SubscriptionSet>,
    loop_tx: mpsc::UnboundedSender<LoopEvent>,
    torn_down: AtomicBool,
    exit: watch::Sender<Option<ExitReason>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<L: Link, A: SessionApi> SessionInner<L, A> {
    pub(crate) fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub(crate) fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    pub(crate) fn events(&self) -> &EventMultiplexer {
        &self.mux
    }

    pub(crate) fn state(&self) -> &StateReconciler {
        &self.reconciler
    }

    pub(crate) fn exit_watch(&self) -> watch::Receiver<Option<ExitReason>> {
        self.exit.subscribe()
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Ends the session. Only the first call does anything.
    pub(crate) fn teardown(&self, reason: ExitReason) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::info!(room_code = %self.room_code, user_id = %self.user, ?reason, "session ending");

        let released = lock(&self.subscriptions).unsubscribe_all();
        self.mux.close();
        self.authority.close();
        self.reconciler.clear();
        self.link.disconnect();
        self.exit.send_replace(Some(reason));

        tracing::debug!(room_code = %self.room_code, released, "session torn down");
        true
    }

    fn send_join(&self) {
        lock(&self.join).requested = true;
        tracing::info!(room_code = %self.room_code, user_id = %self.user, "joining game");
        self.link.send(OutboundEvent::JoinGame {
            room_code: self.room_code.clone(),
        });
    }

    /// Re-joins after a reconnect. Connection ids only grow, so an
    /// acknowledgement for the joined connection or an older one changes
    /// nothing.
    fn on_connected(&self, id: ConnectionId) {
        let mut join = lock(&self.join);
        if !join.requested {
            return;
        }
        match join.joined_on {
            // The first join was queued and went out on this connection.
            None => join.joined_on = Some(id),
            Some(prev) if id <= prev => {
                tracing::debug!(conn_id = %id, joined_on = %prev, "stale or duplicate connect acknowledgement");
            }
            Some(prev) => {
                join.joined_on = Some(id);
                drop(join);
                tracing::info!(room_code = %self.room_code, from = %prev, to = %id, "rejoining after reconnect");
                self.link.send(OutboundEvent::JoinGame {
                    room_code: self.room_code.clone(),
                });
            }
        }
    }

    /// Starts a re-fetch unless one is running, in which case that one is
    /// repeated once it finishes.
    fn request_resync(&self) {
        if self.is_torn_down() {
            return;
        }
        if !self.resync.request() {
            tracing::debug!(room_code = %self.room_code, "re-fetch already in flight, coalescing");
            return;
        }

        let api = Arc::clone(&self.api);
        let gate = Arc::clone(&self.resync);
        let tx = self.loop_tx.clone();
        let game = self.game_id;
        let limit = self.load_timeout;
        tokio::spawn(async move {
            loop {
                let result = match tokio::time::timeout(limit, api.fetch_session(game)).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Unavailable(format!(
                        "fetching game {game} timed out after {limit:?}"
                    ))),
                };
                if tx.send(LoopEvent::Resynced(result)).is_err() || !gate.complete() {
                    break;
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// A live seat at one game.
///
/// Dropping the handle closes the session.
pub struct GameSession<L: Link, A: SessionApi> {
    inner: Arc<SessionInner<L, A>>,
    pump: JoinHandle<()>,
}

impl<A: SessionApi> GameSession<SocketLink<WebSocketConnector>, A> {
    /// Opens a WebSocket link to `config.url` and starts a session on it.
    pub async fn open(
        api: A,
        identity: &IdentityCell,
        game_id: GameId,
        config: ClientConfig,
    ) -> Result<Self, CardroomError> {
        let connector = WebSocketConnector::new(config.url.clone());
        let (link, events) = SocketLink::new(connector, config.reconnect.clone());
        Self::start(link, events, api, identity, game_id, config).await
    }
}

impl<L: Link, A: SessionApi> GameSession<L, A> {
    /// Starts a session over an existing link.
    ///
    /// Fails with `NotAuthenticated` if nobody signs in in time, and with
    /// `LoadFailed` if the first snapshot cannot be fetched in time. In
    /// both cases nothing is left running.
    pub async fn start(
        link: L,
        link_events: LinkEvents,
        api: A,
        identity: &IdentityCell,
        game_id: GameId,
        config: ClientConfig,
    ) -> Result<Self, CardroomError> {
        let config = config.validated();

        // --- Step 1: Identity ---
        let user = identity
            .wait_for(config.identity_timeout)
            .await
            .ok_or(CardroomError::NotAuthenticated(config.identity_timeout))?;

        // --- Step 2: Connect ---
        let link = Arc::new(link);
        link.connect(user);

        // --- Step 3: First snapshot ---
        let api = Arc::new(api);
        let game = match tokio::time::timeout(config.load_timeout, api.fetch_session(game_id)).await {
            Ok(Ok(game)) => game,
            Ok(Err(e)) => {
                link.disconnect();
                return Err(load_failed(game_id, e.to_string()));
            }
            Err(_) => {
                link.disconnect();
                return Err(load_failed(
                    game_id,
                    format!("no snapshot within {:?}", config.load_timeout),
                ));
            }
        };

        // --- Step 4: Wire ---
        let (loop_tx, loop_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            game_id,
            room_code: game.room_code.clone(),
            user,
            load_timeout: config.load_timeout,
            link: Arc::clone(&link),
            api,
            codec: JsonCodec,
            mux: EventMultiplexer::new(),
            reconciler: Arc::new(StateReconciler::new()),
            authority: Arc::new(AuthorityTracker::new()),
            dispatcher: ActionDispatcher::new(link, config.rules.clone()),
            resync: Arc::new(ResyncGate::new()),
            join: Mutex::new(JoinState::default()),
            subscriptions: Mutex::new(SubscriptionSet::new()),
            loop_tx,
            torn_down: AtomicBool::new(false),
            exit: watch::Sender::new(None),
        });
        wire(&inner);
        inner.reconciler.replace(game);

        // --- Step 5: Join ---
        inner.send_join();

        // --- Step 6: Event loop ---
        let pump = tokio::spawn(pump::run(Arc::clone(&inner), link_events, loop_rx));
        tracing::info!(room_code = %inner.room_code, user_id = %user, game = %game_id, "session started");

        Ok(Self { inner, pump })
    }

    pub fn game_id(&self) -> GameId {
        self.inner.game_id
    }

    pub fn room_code(&self) -> &RoomCode {
        &self.inner.room_code
    }

    pub fn user(&self) -> UserId {
        self.inner.user
    }

    pub fn link(&self) -> &L {
        &self.inner.link
    }

    /// Every event channel. Subscribers only see events delivered after
    /// they subscribed.
    pub fn events(&self) -> &EventMultiplexer {
        &self.inner.mux
    }

    /// The latest snapshot. `None` once the session has ended.
    pub fn state(&self) -> Option<Arc<Game>> {
        self.inner.reconciler.latest()
    }

    /// Fires with every new snapshot, pushed or re-fetched.
    pub fn snapshots(&self) -> &Channel<Arc<Game>> {
        self.inner.reconciler.updates()
    }

    pub fn authority(&self) -> HostAuthority {
        self.inner.authority.current()
    }

    pub fn authority_changes(&self) -> &Channel<HostAuthority> {
        self.inner.authority.changes()
    }

    /// The viewer's capabilities as of the latest snapshot, with host
    /// authority hand-offs applied.
    pub fn actor_view(&self) -> Option<ActorView> {
        let game = self.inner.reconciler.latest()?;
        let authority = &self.inner.authority;
        Some(ActorView::new(&game, self.inner.user).with_host(|me| authority.effective_is_host(me)))
    }

    /// Attempts `action`. Refused locally when the viewer lacks the
    /// capability or the session has ended.
    pub fn dispatch(&self, action: Action) -> Dispatch {
        match self.actor_view() {
            Some(view) => self.inner.dispatcher.dispatch(action, &view),
            None => {
                tracing::debug!(action = action.name(), "no snapshot, action refused");
                Dispatch::Refused(Refusal::NotSeated)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.inner.is_torn_down()
    }

    /// Leaves the game.
    ///
    /// The departure is recorded through the game API first; only then is
    /// `leaveGame` sent and the session torn down. If the API call fails
    /// the session stays up and the failure is also reported on `errors`.
    pub async fn leave(&self) -> Result<(), CardroomError> {
        if self.inner.is_torn_down() {
            return Err(CardroomError::Closed);
        }
        match self.inner.api.leave_session(self.inner.game_id).await {
            Ok(()) => {
                self.inner.link.send(OutboundEvent::LeaveGame {
                    room_code: self.inner.room_code.clone(),
                });
                self.inner.teardown(ExitReason::Left);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(room_code = %self.inner.room_code, error = %e, "leave failed");
                let _ = self
                    .inner
                    .loop_tx
                    .send(LoopEvent::Report(ErrorEvent::from(e.clone())));
                Err(e.into())
            }
        }
    }

    /// Closes the session without telling the game API. Idempotent.
    pub fn close(&self) {
        self.inner.teardown(ExitReason::Closed);
    }

    /// Resolves once the session has ended.
    pub async fn closed(&self) -> ExitReason {
        let mut exit = self.inner.exit_watch();
        match exit.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or(ExitReason::Closed),
            Err(_) => ExitReason::Closed,
        }
    }

    /// Returns whether the session's event loop has stopped.
    pub fn is_finished(&self) -> bool {
        self.pump.is_finished()
    }
}

impl<L: Link, A: SessionApi> Drop for GameSession<L, A> {
    fn drop(&mut self) {
        self.inner.teardown(ExitReason::Closed);
    }
}

fn load_failed(game: GameId, reason: String) -> CardroomError {
    tracing::warn!(%game, %reason, "failed to load game");
    CardroomError::LoadFailed { game, reason }
}

/// Subscribes the session's own handlers. Handlers hold the session
/// weakly so that they never keep it alive.
fn wire<L: Link, A: SessionApi>(inner: &Arc<SessionInner<L, A>>) {
    let mut subs = lock(&inner.subscriptions);

    subs.push(inner.reconciler.attach(&inner.mux));
    // Before the eviction handler below, so the eviction is recorded
    // before teardown runs.
    subs.extend(inner.authority.attach(&inner.mux));

    let weak: Weak<SessionInner<L, A>> = Arc::downgrade(inner);
    subs.push(inner.mux.player_joined().subscribe(move |joined| {
        if let Some(inner) = weak.upgrade() {
            tracing::debug!(user_id = %joined.user_id, "member joined, re-fetching snapshot");
            inner.request_resync();
        }
    }));

    let weak = Arc::downgrade(inner);
    subs.push(inner.mux.force_leave_all().subscribe(move |evict| {
        if let Some(inner) = weak.upgrade() {
            inner.teardown(ExitReason::Evicted {
                reason: evict.reason.clone(),
                message: evict.message.clone(),
            });
        }
    }));

    let weak = Arc::downgrade(inner);
    subs.push(inner.mux.connected().subscribe(move |id| {
        if let Some(inner) = weak.upgrade() {
            inner.on_connected(*id);
        }
    }));
}
