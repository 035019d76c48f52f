//! Integration tests for the session lifecycle, driven through an
//! in-memory link and game API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cardroom::prelude::*;
use serde_json::{Value, json};
use tokio::sync::{Semaphore, mpsc};

// =========================================================================
// Mock link and game API
// =========================================================================

#[derive(Default)]
struct MockLink {
    sent: Mutex<Vec<OutboundEvent>>,
    connects: Mutex<Vec<UserId>>,
    disconnects: AtomicUsize,
}

impl MockLink {
    fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().unwrap().clone()
    }

    fn joins(&self) -> usize {
        self.sent()
            .iter()
            .filter(|e| matches!(e, OutboundEvent::JoinGame { .. }))
            .count()
    }

    fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl OutboundSink for MockLink {
    fn send(&self, event: OutboundEvent) {
        self.sent.lock().unwrap().push(event);
    }
}

impl Link for MockLink {
    fn connect(&self, user: UserId) {
        self.connects.lock().unwrap().push(user);
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves `game` to every fetch. Each fetch takes one permit from
/// `permits` first, so a test can hold fetches in flight.
struct MockApi {
    game: Mutex<Result<Game, ApiError>>,
    leave: Mutex<Result<(), ApiError>>,
    permits: Semaphore,
    fetches: AtomicUsize,
    leaves: AtomicUsize,
}

impl MockApi {
    fn serving(game: Game) -> Self {
        Self {
            game: Mutex::new(Ok(game)),
            leave: Mutex::new(Ok(())),
            permits: Semaphore::new(Semaphore::MAX_PERMITS),
            fetches: AtomicUsize::new(0),
            leaves: AtomicUsize::new(0),
        }
    }

    fn with_permits(self, permits: usize) -> Self {
        Self {
            permits: Semaphore::new(permits),
            ..self
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SessionApi for MockApi {
    async fn fetch_session(&self, _game: GameId) -> Result<Game, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.permits
            .acquire()
            .await
            .expect("semaphore stays open")
            .forget();
        self.game.lock().unwrap().clone()
    }

    async fn leave_session(&self, _game: GameId) -> Result<(), ApiError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        self.leave.lock().unwrap().clone()
    }
}

// =========================================================================
// Helpers
// =========================================================================

const ME: UserId = UserId(42);

/// `(player id, user id, name, is host)` per seat.
fn game(status: &str, seats: &[(u64, u64, &str, bool)]) -> Game {
    let players: Vec<Value> = seats
        .iter()
        .map(|&(id, user, name, host)| {
            json!({"id": id, "userId": user, "username": name, "isHost": host, "cards": []})
        })
        .collect();
    serde_json::from_value(json!({
        "id": 7,
        "roomCode": "AB12",
        "status": status,
        "minPlayers": 4,
        "maxPlayers": 8,
        "players": players
    }))
    .expect("game should decode")
}

fn table_with_me() -> Game {
    game("waiting", &[(1, 1, "Leo", true), (2, 42, "Ana", false)])
}

fn frame(event: &str, data: Value) -> LinkEvent {
    LinkEvent::Frame(json!({"event": event, "data": data}).to_string())
}

fn fast_config() -> ClientConfig {
    ClientConfig::builder()
        .load_timeout(Duration::from_millis(200))
        .identity_timeout(Duration::from_millis(50))
        .build()
}

struct Harness {
    session: GameSession<Arc<MockLink>, Arc<MockApi>>,
    link: Arc<MockLink>,
    api: Arc<MockApi>,
    inbound: mpsc::UnboundedSender<LinkEvent>,
}

impl Harness {
    async fn start(api: MockApi) -> Self {
        let link = Arc::new(MockLink::default());
        let api = Arc::new(api);
        let (inbound, events) = mpsc::unbounded_channel();
        let session = GameSession::start(
            Arc::clone(&link),
            events,
            Arc::clone(&api),
            &IdentityCell::signed_in(ME),
            GameId(7),
            fast_config(),
        )
        .await
        .expect("session should start");
        Self {
            session,
            link,
            api,
            inbound,
        }
    }

    fn push(&self, event: LinkEvent) {
        self.inbound.send(event).expect("loop should be running");
    }
}

fn counter<T: 'static>(channel: &Channel<T>) -> (Arc<AtomicUsize>, Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let sub = channel.subscribe(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    (count, sub)
}

/// Polls `cond` until it holds or two seconds pass.
async fn eventually(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

// =========================================================================
// Start-up
// =========================================================================

#[tokio::test]
async fn test_session_start_connects_loads_then_joins() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;

    assert_eq!(*h.link.connects.lock().unwrap(), vec![ME]);
    assert_eq!(
        h.link.sent(),
        vec![OutboundEvent::JoinGame {
            room_code: RoomCode::new("AB12")
        }]
    );
    assert_eq!(h.session.room_code().as_str(), "AB12");
    assert_eq!(h.session.state().unwrap().players.len(), 2);
    assert!(h.session.is_active());
}

#[tokio::test]
async fn test_session_start_without_identity_is_not_authenticated() {
    let link = Arc::new(MockLink::default());
    let (_tx, events) = mpsc::unbounded_channel();

    let result = GameSession::start(
        Arc::clone(&link),
        events,
        MockApi::serving(table_with_me()),
        &IdentityCell::new(),
        GameId(7),
        fast_config(),
    )
    .await;

    assert!(matches!(result, Err(CardroomError::NotAuthenticated(_))));
    assert!(link.connects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_session_start_snapshot_timeout_is_load_failed() {
    let link = Arc::new(MockLink::default());
    let (_tx, events) = mpsc::unbounded_channel();

    let result = GameSession::start(
        Arc::clone(&link),
        events,
        MockApi::serving(table_with_me()).with_permits(0),
        &IdentityCell::signed_in(ME),
        GameId(7),
        fast_config(),
    )
    .await;

    assert!(matches!(
        result,
        Err(CardroomError::LoadFailed { game: GameId(7), .. })
    ));
    assert_eq!(link.disconnects(), 1);
    assert!(link.sent().is_empty(), "no join without a snapshot");
}

#[tokio::test]
async fn test_session_start_api_error_is_load_failed() {
    let link = Arc::new(MockLink::default());
    let (_tx, events) = mpsc::unbounded_channel();
    let api = MockApi::serving(table_with_me());
    *api.game.lock().unwrap() = Err(ApiError::NotFound(GameId(7)));

    let result = GameSession::start(
        Arc::clone(&link),
        events,
        api,
        &IdentityCell::signed_in(ME),
        GameId(7),
        fast_config(),
    )
    .await;

    match result {
        Err(CardroomError::LoadFailed { reason, .. }) => assert!(reason.contains("not found")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session should not start"),
    }
    assert_eq!(link.disconnects(), 1);
}

// =========================================================================
// Mirror
// =========================================================================

#[tokio::test]
async fn test_game_state_events_replace_mirror() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let (updates, _sub) = counter(h.session.snapshots());

    h.push(frame(
        "gameState",
        json!({"id": 7, "roomCode": "AB12", "status": "playing", "players": []}),
    ));
    h.push(frame(
        "gameState",
        json!({"id": 7, "roomCode": "AB12", "status": "finished", "winnerId": 2, "players": []}),
    ));

    eventually("two snapshots", || updates.load(Ordering::SeqCst) == 2).await;
    let state = h.session.state().unwrap();
    assert_eq!(state.status, GameStatus::Finished);
    assert_eq!(state.winner_id, Some(PlayerId(2)));
    assert!(state.players.is_empty());
}

#[tokio::test]
async fn test_player_joined_refetches_and_coalesces() {
    // One permit for the initial load; re-fetches wait for the test.
    let h = Harness::start(MockApi::serving(table_with_me()).with_permits(1)).await;
    assert_eq!(h.api.fetches(), 1);

    for user in [5, 6, 7] {
        h.push(frame(
            "playerJoined",
            json!({"userId": user, "message": format!("user {user} joined")}),
        ));
    }
    eventually("first re-fetch in flight", || h.api.fetches() == 2).await;

    *h.api.game.lock().unwrap() = Ok(game(
        "waiting",
        &[
            (1, 1, "Leo", true),
            (2, 42, "Ana", false),
            (3, 5, "Mia", false),
            (4, 6, "Kai", false),
            (5, 7, "Zoe", false),
        ],
    ));
    h.api.permits.add_permits(1);
    eventually("follow-up re-fetch", || h.api.fetches() == 3).await;
    h.api.permits.add_permits(1);

    eventually("re-fetched snapshot applied", || {
        h.session.state().is_some_and(|g| g.players.len() == 5)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.api.fetches(), 3, "three joins cost two re-fetches");
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_close_twice_disconnects_once() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let (errors, _sub) = counter(h.session.events().errors());

    h.session.close();
    h.session.close();
    assert_eq!(h.link.disconnects(), 1);
    assert_eq!(h.session.closed().await, ExitReason::Closed);

    // Nothing reaches handlers after teardown.
    let _ = h.inbound.send(LinkEvent::Fault(ErrorEvent::Transport("late".into())));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(h.session.state().is_none());
    assert!(matches!(h.session.leave().await, Err(CardroomError::Closed)));

    let Harness { session, link, .. } = h;
    drop(session);
    assert_eq!(link.disconnects(), 1);
}

#[tokio::test]
async fn test_force_leave_all_tears_down_before_queued_events() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let (snapshots, _a) = counter(h.session.snapshots());
    let (actions, _b) = counter(h.session.events().player_action());

    // Queued back to back: the loop has not run yet.
    h.push(frame(
        "forceLeaveAll",
        json!({"reason": "host_left", "message": "The host closed the table"}),
    ));
    h.push(frame(
        "gameState",
        json!({"id": 7, "roomCode": "AB12", "status": "playing", "players": []}),
    ));
    h.push(frame("playerAction", json!({"message": "Mia drew a card"})));

    assert_eq!(
        h.session.closed().await,
        ExitReason::Evicted {
            reason: "host_left".into(),
            message: "The host closed the table".into(),
        }
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(snapshots.load(Ordering::SeqCst), 0);
    assert_eq!(actions.load(Ordering::SeqCst), 0);
    assert_eq!(h.link.disconnects(), 1);
    assert!(!h.session.is_active());
}

#[tokio::test]
async fn test_link_lost_ends_session() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    h.push(LinkEvent::Lost);
    assert_eq!(h.session.closed().await, ExitReason::LinkLost);
    assert_eq!(h.link.disconnects(), 1);
}

// =========================================================================
// Leave
// =========================================================================

#[tokio::test]
async fn test_leave_records_departure_then_sends_leave_game() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;

    h.session.leave().await.expect("leave should succeed");

    assert_eq!(h.api.leaves.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.link.sent().last(),
        Some(&OutboundEvent::LeaveGame {
            room_code: RoomCode::new("AB12")
        })
    );
    assert_eq!(h.link.disconnects(), 1);
    assert_eq!(h.session.closed().await, ExitReason::Left);
}

#[tokio::test]
async fn test_leave_failure_keeps_session_and_reports_error() {
    let api = MockApi::serving(table_with_me());
    *api.leave.lock().unwrap() = Err(ApiError::Unavailable("503".into()));
    let h = Harness::start(api).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = h
        .session
        .events()
        .errors()
        .subscribe(move |e: &ErrorEvent| sink.lock().unwrap().push(e.clone()));

    let result = h.session.leave().await;
    assert!(matches!(result, Err(CardroomError::Api(_))));

    eventually("api error reported", || !seen.lock().unwrap().is_empty()).await;
    assert!(matches!(seen.lock().unwrap()[0], ErrorEvent::Api(_)));
    assert!(h.session.is_active());
    assert_eq!(h.link.disconnects(), 0);
    assert!(
        !h.link
            .sent()
            .iter()
            .any(|e| matches!(e, OutboundEvent::LeaveGame { .. }))
    );
}

// =========================================================================
// Connection churn
// =========================================================================

#[tokio::test]
async fn test_rejoin_only_on_new_connection() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let (connected, _sub) = counter(h.session.events().connected());
    assert_eq!(h.link.joins(), 1);

    // The first join rode on connection 1.
    h.push(LinkEvent::Connected(ConnectionId::new(1)));
    h.push(LinkEvent::Connected(ConnectionId::new(1)));
    eventually("two acks", || connected.load(Ordering::SeqCst) == 2).await;
    assert_eq!(h.link.joins(), 1);

    h.push(LinkEvent::Connected(ConnectionId::new(2)));
    eventually("rejoin", || h.link.joins() == 2).await;

    h.push(LinkEvent::Connected(ConnectionId::new(2)));
    eventually("four acks", || connected.load(Ordering::SeqCst) == 4).await;
    assert_eq!(h.link.joins(), 2);
}

#[tokio::test]
async fn test_rejoin_ignores_stale_and_duplicate_acks() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let (connected, _sub) = counter(h.session.events().connected());

    h.push(LinkEvent::Connected(ConnectionId::new(1)));
    h.push(LinkEvent::Connected(ConnectionId::new(2)));
    eventually("rejoin on 2", || h.link.joins() == 2).await;

    // A late ack for connection 1, then a repeat for 2.
    h.push(LinkEvent::Connected(ConnectionId::new(1)));
    h.push(LinkEvent::Connected(ConnectionId::new(2)));
    eventually("four acks", || connected.load(Ordering::SeqCst) == 4).await;
    assert_eq!(h.link.joins(), 2);

    h.push(LinkEvent::Connected(ConnectionId::new(3)));
    eventually("rejoin on 3", || h.link.joins() == 3).await;
}

#[tokio::test]
async fn test_transport_fault_and_server_error_reach_errors_channel() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = h
        .session
        .events()
        .errors()
        .subscribe(move |e: &ErrorEvent| sink.lock().unwrap().push(e.clone()));

    h.push(LinkEvent::Fault(ErrorEvent::connect_failed("connection refused")));
    h.push(frame("error", json!({"message": "Need at least 4 players"})));
    h.push(frame("somethingNew", json!({})));

    eventually("two errors", || seen.lock().unwrap().len() == 2).await;
    let seen = seen.lock().unwrap();
    assert_eq!(
        seen[0].message(),
        "Failed to connect to WebSocket server: connection refused"
    );
    assert_eq!(seen[1], ErrorEvent::Rejected("Need at least 4 players".into()));
    assert!(h.session.is_active(), "errors are not fatal");
}

// =========================================================================
// Dispatch
// =========================================================================

#[tokio::test]
async fn test_start_game_needs_host_and_full_table() {
    // Identity 42 is not seated at first: only the host is.
    let h = Harness::start(MockApi::serving(game("waiting", &[(1, 1, "Leo", true)]))).await;
    assert!(!h.session.dispatch(Action::StartGame).is_sent());

    h.push(frame(
        "gameState",
        json!({
            "id": 7, "roomCode": "AB12", "status": "waiting",
            "players": [
                {"id": 1, "userId": 42, "username": "Ana", "isHost": true},
                {"id": 2, "userId": 2, "username": "Leo", "isHost": false},
                {"id": 3, "userId": 3, "username": "Mia", "isHost": false},
                {"id": 4, "userId": 4, "username": "Kai", "isHost": false},
                {"id": 5, "userId": 5, "username": "Zoe", "isHost": false},
                {"id": 6, "userId": 6, "username": "Eli", "isHost": false}
            ]
        }),
    ));
    eventually("full table", || {
        h.session.state().is_some_and(|g| g.players.len() == 6)
    })
    .await;

    assert_eq!(h.session.dispatch(Action::StartGame), Dispatch::Sent);
    assert_eq!(
        h.link.sent().last(),
        Some(&OutboundEvent::StartGame {
            room_code: RoomCode::new("AB12")
        })
    );
}

#[tokio::test]
async fn test_host_transfer_moves_capabilities() {
    let h = Harness::start(MockApi::serving(table_with_me())).await;
    let deal = Action::DealCard {
        target: PlayerId(1),
    };
    assert_eq!(
        h.session.dispatch(deal),
        Dispatch::Refused(Refusal::NotHost)
    );
    assert!(h.session.dispatch(Action::RequestCard).is_sent());

    h.push(frame(
        "hostTransferred",
        json!({"message": "Ana is host for now", "isTemporary": true, "newHostName": "Ana"}),
    ));
    eventually("delegation", || h.session.authority().is_delegated()).await;

    assert!(h.session.actor_view().unwrap().is_host);
    assert_eq!(h.session.dispatch(deal), Dispatch::Sent);
    assert_eq!(
        h.session.dispatch(Action::RequestCard),
        Dispatch::Refused(Refusal::HostCannot)
    );

    h.push(frame(
        "hostRestored",
        json!({"message": "Leo is back", "originalHostName": "Leo"}),
    ));
    eventually("restore", || {
        h.session.authority()
            == HostAuthority::Primary {
                host_name: Some("Leo".into()),
            }
    })
    .await;
    assert!(!h.session.dispatch(deal).is_sent());
}
