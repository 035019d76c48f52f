//! Dispatch against real snapshots, decoded from the wire format.

use std::sync::Mutex;

use cardroom_protocol::{Game, OutboundEvent, RoomCode, UserId};
use cardroom_room::{Action, ActionDispatcher, ActorView, Dispatch, OutboundSink, RoomRules};
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<OutboundEvent>>,
}

impl OutboundSink for Recorder {
    fn send(&self, event: OutboundEvent) {
        self.sent.lock().unwrap().push(event);
    }
}

fn player(id: u64, user: u64, is_host: bool) -> serde_json::Value {
    json!({
        "id": id,
        "userId": user,
        "username": format!("user{user}"),
        "position": id,
        "isHost": is_host,
        "cards": []
    })
}

fn snapshot(players: Vec<serde_json::Value>) -> Game {
    serde_json::from_value(json!({
        "id": 1,
        "roomCode": "AB12",
        "status": "waiting",
        "minPlayers": 4,
        "maxPlayers": 8,
        "players": players
    }))
    .expect("snapshot should decode")
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_start_game_blocked_then_allowed_as_table_fills() {
    let dispatcher = ActionDispatcher::new(Recorder::default(), RoomRules::default());

    // Identity 42 joins AB12; only the host is seated.
    let first = snapshot(vec![player(1, 1, true)]);
    let view = ActorView::new(&first, UserId(42));
    assert!(!dispatcher.dispatch(Action::StartGame, &view).is_sent());
    assert!(dispatcher.sink().sent.lock().unwrap().is_empty());

    // Five non-host members later, the host may start.
    let mut players = vec![player(1, 1, true)];
    players.extend((2..=5).map(|i| player(i, i, false)));
    players.push(player(6, 42, false));
    let full = snapshot(players);

    let guest = ActorView::new(&full, UserId(42));
    assert_eq!(guest.non_host_players, 5);
    assert!(!dispatcher.dispatch(Action::StartGame, &guest).is_sent());

    let host = ActorView::new(&full, UserId(1));
    assert_eq!(dispatcher.dispatch(Action::StartGame, &host), Dispatch::Sent);

    let sent = dispatcher.sink().sent.lock().unwrap();
    assert_eq!(
        *sent,
        vec![OutboundEvent::StartGame {
            room_code: RoomCode::new("AB12")
        }]
    );
    assert_eq!(
        serde_json::to_value(&sent[0]).unwrap(),
        json!({"event": "startGame", "data": {"roomCode": "AB12"}})
    );
}

#[test]
fn test_user_player_block_seats_the_viewer() {
    let mut game = snapshot(vec![player(1, 1, true)]);
    game.user_player = serde_json::from_value(json!({
        "id": 7,
        "position": 2,
        "isHost": false,
        "isCurrentTurn": true
    }))
    .unwrap();

    let dispatcher = ActionDispatcher::new(Recorder::default(), RoomRules::default());
    let view = ActorView::new(&game, UserId(42));
    assert!(view.me.is_some());
    assert_eq!(dispatcher.dispatch(Action::SkipTurn, &view), Dispatch::Sent);
    // No display name known, so no host notification follows a card request.
    assert_eq!(dispatcher.dispatch(Action::RequestCard, &view), Dispatch::Sent);
    assert_eq!(dispatcher.sink().sent.lock().unwrap().len(), 2);
}
