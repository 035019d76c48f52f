//! The client side of the persistent connection.
//!
//! A [`Link`] is what the session talks through: `connect` once, `send`
//! fire-and-forget, `disconnect` once. [`SocketLink`] is the real one. It
//! owns a background task that dials the server, authenticates, pumps
//! frames both ways, and reconnects with backoff when the connection
//! drops.
//!
//! ```text
//!  send() ──► command queue ──► link task ──► Connection ──► server
//!                                  │
//!  LinkEvents ◄── Connected / Fault / Frame / Lost
//! ```
//!
//! # States
//!
//! ```text
//!  Idle ─connect()─► Connecting ─► Open ⇄ Reconnecting
//!                        │          │         │
//!                        └──────────┴─────────┴──► Closed
//! ```
//!
//! Sends made while `Connecting` (the very first dial) are queued and go
//! out right after `authenticate`. Sends in any other non-open state are
//! dropped and reported as a transport fault: replaying stale actions
//! onto a new connection would be worse than losing them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cardroom_protocol::{Codec, JsonCodec, OutboundEvent, UserId};
use cardroom_room::OutboundSink;
use cardroom_session::ErrorEvent;
use cardroom_transport::{Connection, ConnectionId, Connector, ReconnectPolicy};
use tokio::sync::mpsc;

/// What a link reports to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection is up and authenticated. Every (re)connection gets a
    /// fresh id.
    Connected(ConnectionId),
    /// A non-fatal transport problem.
    Fault(ErrorEvent),
    /// One inbound text frame.
    Frame(String),
    /// The link gave up reconnecting. Nothing follows.
    Lost,
}

/// Receiving end of a link's events.
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

/// A connection a session can drive.
///
/// Implementors must tolerate `connect` being called on an already
/// connected link and `disconnect` being called more than once.
pub trait Link: OutboundSink + 'static {
    /// Opens the connection (if not already open) and authenticates as
    /// `user` on it.
    fn connect(&self, user: UserId);

    /// Closes the connection after flushing what was already sent.
    fn disconnect(&self);
}

impl<T: Link + ?Sized> Link for Arc<T> {
    fn connect(&self, user: UserId) {
        (**self).connect(user);
    }

    fn disconnect(&self) {
        (**self).disconnect();
    }
}

// ---------------------------------------------------------------------------
// LinkState
// ---------------------------------------------------------------------------

/// Lifecycle of a [`SocketLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Reconnecting = 3,
    Closed = 4,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Reconnecting,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves to `to` unless the link is already closed.
    fn advance(&self, to: LinkState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != LinkState::Closed as u8).then_some(to as u8)
            })
            .is_ok()
    }

    fn close(&self) -> LinkState {
        LinkState::from_u8(self.0.swap(LinkState::Closed as u8, Ordering::AcqRel))
    }
}

// ---------------------------------------------------------------------------
// SocketLink
// ---------------------------------------------------------------------------

enum LinkCommand {
    Send(String),
    Close,
}

struct LinkShared<C> {
    connector: C,
    policy: ReconnectPolicy,
    state: StateCell,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl<C> LinkShared<C> {
    fn emit(&self, event: LinkEvent) {
        // The session may already be gone; nobody left to tell.
        let _ = self.events.send(event);
    }

    fn fault(&self, error: ErrorEvent) {
        self.emit(LinkEvent::Fault(error));
    }
}

/// A reconnecting link over any [`Connector`].
pub struct SocketLink<C: Connector, K: Codec = JsonCodec> {
    shared: Arc<LinkShared<C>>,
    codec: K,
    commands: Mutex<Option<mpsc::UnboundedSender<LinkCommand>>>,
}

impl<C: Connector> SocketLink<C> {
    /// Creates an idle link speaking JSON frames.
    pub fn new(connector: C, policy: ReconnectPolicy) -> (Self, LinkEvents) {
        Self::with_codec(connector, policy, JsonCodec)
    }
}

impl<C: Connector, K: Codec> SocketLink<C, K> {
    pub fn with_codec(connector: C, policy: ReconnectPolicy, codec: K) -> (Self, LinkEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let link = Self {
            shared: Arc::new(LinkShared {
                connector,
                policy,
                state: StateCell(AtomicU8::new(LinkState::Idle as u8)),
                events,
            }),
            codec,
            commands: Mutex::new(None),
        };
        (link, rx)
    }

    pub fn state(&self) -> LinkState {
        self.shared.state.get()
    }

    pub fn endpoint(&self) -> &str {
        self.shared.connector.endpoint()
    }

    fn commands(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<LinkCommand>>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector, K: Codec> OutboundSink for SocketLink<C, K> {
    fn send(&self, event: OutboundEvent) {
        let frame = match self.codec.encode_event(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "failed to encode outbound event");
                return;
            }
        };

        let state = self.shared.state.get();
        if matches!(state, LinkState::Connecting | LinkState::Open) {
            if let Some(commands) = self.commands().as_ref() {
                if commands.send(LinkCommand::Send(frame)).is_ok() {
                    tracing::trace!(event = event.name(), ?state, "outbound event queued");
                    return;
                }
            }
        }

        tracing::debug!(event = event.name(), ?state, "dropping send, link not connected");
        self.shared.fault(ErrorEvent::Transport(format!(
            "Cannot send {}: not connected to WebSocket server",
            event.name()
        )));
    }
}

impl<C: Connector, K: Codec> Link for SocketLink<C, K> {
    fn connect(&self, user: UserId) {
        let mut commands = self.commands();
        if commands.is_some() || self.shared.state.get() != LinkState::Idle {
            tracing::debug!(state = ?self.shared.state.get(), "connect ignored, link already started");
            return;
        }

        let auth = match self.codec.encode_event(&OutboundEvent::Authenticate { user_id: user }) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode authenticate");
                return;
            }
        };

        if !self.shared.state.advance(LinkState::Connecting) {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *commands = Some(tx);

        tracing::info!(endpoint = self.endpoint(), user_id = %user, "link connecting");
        tokio::spawn(run_link(Arc::clone(&self.shared), auth, rx));
    }

    fn disconnect(&self) {
        if self.shared.state.close() == LinkState::Closed {
            return;
        }
        if let Some(commands) = self.commands().take() {
            // Queued after every earlier send, so those still go out.
            let _ = commands.send(LinkCommand::Close);
        }
        tracing::info!(endpoint = self.endpoint(), "link disconnecting");
    }
}

impl<C: Connector, K: Codec> Drop for SocketLink<C, K> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Link task
// ---------------------------------------------------------------------------

enum Served {
    /// Close was requested; the task should stop.
    Closed,
    /// The connection broke; the task should reconnect.
    Dropped,
}

async fn run_link<C: Connector>(
    shared: Arc<LinkShared<C>>,
    auth: String,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
) {
    let endpoint = shared.connector.endpoint().to_string();
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut failures: u32 = 0;
    let mut delay: Option<Duration> = None;

    loop {
        if let Some(delay) = delay.take() {
            if !wait_backoff(&shared, &mut commands, &mut pending, delay).await {
                break;
            }
        }

        let conn = match shared.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(%endpoint, attempt = failures, error = %e, "connect failed");
                shared.fault(ErrorEvent::connect_failed(&e));
                match retry_delay(&shared.policy, &mut failures) {
                    Some(d) => {
                        delay = Some(d);
                        continue;
                    }
                    None => {
                        give_up(&shared);
                        break;
                    }
                }
            }
        };

        let id = conn.id();
        if !shared.state.advance(LinkState::Open) {
            let _ = conn.close().await;
            break;
        }

        let outcome = match conn.send(&auth).await {
            Ok(()) => {
                failures = 0;
                tracing::info!(%endpoint, conn_id = %id, "link connected");
                shared.emit(LinkEvent::Connected(id));
                serve(&shared, &conn, &mut commands, &mut pending).await
            }
            Err(e) => {
                shared.fault(ErrorEvent::Transport(format!("Authentication send failed: {e}")));
                Served::Dropped
            }
        };

        match outcome {
            Served::Closed => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(conn_id = %id, error = %e, "close failed");
                }
                tracing::info!(conn_id = %id, "link closed");
                return;
            }
            Served::Dropped => {
                if !shared.state.advance(LinkState::Reconnecting) {
                    break;
                }
                tracing::warn!(conn_id = %id, "connection dropped, reconnecting");
                match retry_delay(&shared.policy, &mut failures) {
                    Some(d) => delay = Some(d),
                    None => {
                        give_up(&shared);
                        break;
                    }
                }
            }
        }
    }
    tracing::debug!(%endpoint, "link task stopped");
}

fn retry_delay(policy: &ReconnectPolicy, failures: &mut u32) -> Option<Duration> {
    if !policy.allows(*failures) {
        return None;
    }
    let delay = policy.delay_for(*failures);
    *failures += 1;
    Some(delay)
}

fn give_up<C>(shared: &LinkShared<C>) {
    if shared.state.close() != LinkState::Closed {
        tracing::warn!("giving up on reconnecting");
        shared.emit(LinkEvent::Lost);
    }
}

/// Sleeps for `delay` while still honouring commands. Returns `false`
/// when the link was closed meanwhile.
async fn wait_backoff<C>(
    shared: &LinkShared<C>,
    commands: &mut mpsc::UnboundedReceiver<LinkCommand>,
    pending: &mut VecDeque<String>,
    delay: Duration,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = commands.recv() => match cmd {
                Some(LinkCommand::Send(frame)) => {
                    if shared.state.get() == LinkState::Connecting {
                        pending.push_back(frame);
                    } else {
                        shared.fault(ErrorEvent::Transport(
                            "Cannot send: not connected to WebSocket server".into(),
                        ));
                    }
                }
                Some(LinkCommand::Close) | None => return false,
            },
        }
    }
}

async fn serve<C, T: Connection>(
    shared: &LinkShared<C>,
    conn: &T,
    commands: &mut mpsc::UnboundedReceiver<LinkCommand>,
    pending: &mut VecDeque<String>,
) -> Served {
    while let Some(frame) = pending.pop_front() {
        if let Err(e) = conn.send(&frame).await {
            shared.fault(ErrorEvent::Transport(format!("Send failed: {e}")));
            return Served::Dropped;
        }
    }

    loop {
        tokio::select! {
            biased;
            cmd = commands.recv() => match cmd {
                Some(LinkCommand::Send(frame)) => {
                    if let Err(e) = conn.send(&frame).await {
                        shared.fault(ErrorEvent::Transport(format!("Send failed: {e}")));
                        return Served::Dropped;
                    }
                }
                Some(LinkCommand::Close) | None => return Served::Closed,
            },
            msg = conn.recv() => match msg {
                Ok(Some(text)) => shared.emit(LinkEvent::Frame(text)),
                Ok(None) => {
                    shared.fault(ErrorEvent::Transport(
                        "Disconnected from WebSocket server".into(),
                    ));
                    return Served::Dropped;
                }
                Err(e) => {
                    shared.fault(ErrorEvent::Transport(format!("Connection lost: {e}")));
                    return Served::Dropped;
                }
            },
        }
    }
}
