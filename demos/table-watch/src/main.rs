use std::path::PathBuf;

use cardroom::prelude::*;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ---------------------------------------------------------------------------
// Snapshot source
// ---------------------------------------------------------------------------

/// Serves the game snapshot from a JSON file, re-read on every fetch so
/// edits show up on the next re-fetch.
struct SnapshotFile {
    path: PathBuf,
}

impl SessionApi for SnapshotFile {
    async fn fetch_session(&self, game: GameId) -> Result<Game, ApiError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ApiError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let snapshot: Game = serde_json::from_str(&text)
            .map_err(|e| ApiError::Unavailable(format!("bad snapshot: {e}")))?;
        if snapshot.id != game {
            return Err(ApiError::NotFound(game));
        }
        Ok(snapshot)
    }

    async fn leave_session(&self, _game: GameId) -> Result<(), ApiError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Watching
// ---------------------------------------------------------------------------

/// Watch one card table and log everything that happens at it.
#[derive(Parser, Debug)]
#[command(name = "table-watch", version)]
struct Args {
    /// WebSocket endpoint of the game server.
    #[arg(long, default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Id of the signed-in user.
    #[arg(long)]
    user: u64,

    /// Id of the game to watch.
    #[arg(long)]
    game: u64,

    /// JSON file holding the game snapshot.
    #[arg(long)]
    snapshot: PathBuf,
}

/// Logs everything a session publishes. Dropping the result unsubscribes.
fn log_events<L: Link, A: SessionApi>(session: &GameSession<L, A>) -> Vec<Subscription> {
    let events = session.events();
    vec![
        session.snapshots().subscribe(|game| {
            tracing::info!(
                status = ?game.status,
                seats = game.players.len(),
                host = ?game.host().map(|p| p.username.as_str()),
                turn = ?game.current_turn_player_id,
                "table updated"
            );
        }),
        session
            .authority_changes()
            .subscribe(|authority| tracing::info!(?authority, "host authority changed")),
        events
            .player_joined()
            .subscribe(|e| tracing::info!(user_id = %e.user_id, "{}", e.message)),
        events
            .player_action()
            .subscribe(|e| tracing::info!("{}", e.message)),
        events
            .player_stand()
            .subscribe(|e| tracing::info!(player = %e.player_name, "{}", e.message)),
        events
            .rematch_vote_confirmed()
            .subscribe(|e| tracing::info!(voted = e.has_voted, "rematch vote confirmed")),
        events
            .game_ended()
            .subscribe(|e| tracing::info!(reason = %e.reason, "game ended")),
        events.errors().subscribe(|e| tracing::warn!("{e}")),
    ]
}

async fn watch(args: Args) -> Result<ExitReason, CardroomError> {
    let identity = IdentityCell::signed_in(UserId(args.user));
    let config = ClientConfig::builder().url(args.url).build();
    let api = SnapshotFile {
        path: args.snapshot,
    };

    let session = GameSession::open(api, &identity, GameId(args.game), config).await?;
    let _subscriptions = log_events(&session);
    tracing::info!(room_code = %session.room_code(), "watching table");

    tokio::select! {
        reason = session.closed() => Ok(reason),
        _ = tokio::signal::ctrl_c() => {
            session.leave().await?;
            Ok(session.closed().await)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,cardroom=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let reason = watch(args).await?;
    tracing::info!(?reason, "session over");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    fn write_snapshot(name: &str, body: serde_json::Value) -> PathBuf {
        let path = std::env::temp_dir().join(format!("table-watch-{}-{name}.json", std::process::id()));
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn args_for(url: String, game: u64, snapshot: PathBuf) -> Args {
        Args {
            url,
            user: 42,
            game,
            snapshot,
        }
    }

    #[test]
    fn test_args_parse_reads_named_flags() {
        let args = Args::try_parse_from([
            "table-watch",
            "--url",
            "ws://localhost:3000",
            "--user",
            "42",
            "--game",
            "7",
            "--snapshot",
            "table.json",
        ])
        .unwrap();
        assert_eq!(args.url, "ws://localhost:3000");
        assert_eq!(args.user, 42);
        assert_eq!(args.game, 7);
        assert_eq!(args.snapshot, PathBuf::from("table.json"));
    }

    #[test]
    fn test_args_parse_defaults_url() {
        let args = Args::try_parse_from([
            "table-watch",
            "--user",
            "1",
            "--game",
            "2",
            "--snapshot",
            "t.json",
        ])
        .unwrap();
        assert_eq!(args.url, "ws://127.0.0.1:3000/ws");
    }

    #[test]
    fn test_args_parse_missing_user_is_rejected() {
        let err = Args::try_parse_from(["table-watch", "--game", "7", "--snapshot", "t.json"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_args_parse_non_numeric_game_is_rejected() {
        let err = Args::try_parse_from([
            "table-watch",
            "--user",
            "1",
            "--game",
            "seven",
            "--snapshot",
            "t.json",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[tokio::test]
    async fn test_snapshot_file_wrong_game_is_not_found() {
        let path = write_snapshot(
            "wrong-game",
            serde_json::json!({"id": 7, "roomCode": "AB12", "status": "waiting"}),
        );
        let api = SnapshotFile { path };
        assert_eq!(
            api.fetch_session(GameId(8)).await.unwrap_err(),
            ApiError::NotFound(GameId(8))
        );
        assert_eq!(api.fetch_session(GameId(7)).await.unwrap().room_code, RoomCode::new("AB12"));
    }

    #[tokio::test]
    async fn test_watch_ends_when_server_evicts_everyone() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let snapshot = write_snapshot(
            "evict",
            serde_json::json!({
                "id": 7,
                "roomCode": "AB12",
                "status": "waiting",
                "players": [
                    {"id": 1, "userId": 42, "username": "Ana", "isHost": true, "cards": []}
                ]
            }),
        );

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            while received.len() < 2 {
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    received.push(text.as_str().to_string());
                }
            }
            ws.send(Message::Text(
                r#"{"event":"forceLeaveAll","data":{"reason":"host_left","message":"Table closed"}}"#
                    .into(),
            ))
            .await
            .unwrap();
            received
        });

        let reason = tokio::time::timeout(Duration::from_secs(5), watch(args_for(url, 7, snapshot)))
            .await
            .expect("session should end in time")
            .unwrap();

        assert_eq!(
            reason,
            ExitReason::Evicted {
                reason: "host_left".into(),
                message: "Table closed".into(),
            }
        );
        let received = server.await.unwrap();
        assert!(received[0].contains("authenticate"));
        assert!(received[1].contains("joinGame"));
    }
}
