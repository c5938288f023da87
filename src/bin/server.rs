use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use maze_chase_server::constants::TICK_MS;
use maze_chase_server::engine::{GameEngine, GameEngineOptions};
use maze_chase_server::score_store::ScoreStore;
use maze_chase_server::server_protocol::{decode_client_message, ClientMessage};
use maze_chase_server::types::{Snapshot, StartPlayer};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static ID_SEQ: AtomicU64 = AtomicU64::new(1);

const OUTBOX_DEPTH: usize = 256;
const NAME_MAX_CHARS: usize = 16;
const TOKEN_CHARS: usize = 48;

type SharedHub = Arc<Mutex<Hub>>;

/// One lobby seat or spectator slot, stable across reconnects via its token.
#[derive(Clone, Debug)]
struct Member {
    id: String,
    name: String,
    connected: bool,
    spectator: bool,
    reconnect_token: String,
}

struct Connection {
    outbox: mpsc::Sender<Outbound>,
    member_id: Option<String>,
}

enum Outbound {
    Frame(String),
    Bye { code: u16, reason: String },
}

/// What to do with a connection whose outbox is full: state frames are
/// droppable (the next tick supersedes them), everything else is not.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OnBackpressure {
    DropFrame,
    Disconnect,
}

struct Hub {
    connections: HashMap<String, Connection>,
    members: HashMap<String, Member>,
    live_connection_of: HashMap<String, String>,
    game: Option<GameEngine>,
    scores: ScoreStore,
}

impl Hub {
    fn new(scores: ScoreStore) -> Self {
        Self {
            connections: HashMap::new(),
            members: HashMap::new(),
            live_connection_of: HashMap::new(),
            game: None,
            scores,
        }
    }

    fn seat_holder(&self) -> Option<&Member> {
        self.members.values().find(|member| !member.spectator)
    }

    fn member_id_of(&self, connection_id: &str) -> Option<String> {
        self.connections
            .get(connection_id)
            .and_then(|conn| conn.member_id.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ScoreboardQuery {
    limit: Option<String>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(8080);
    let scores_path = std::env::var("SCORES_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/scores.json"));

    let hub: SharedHub = Arc::new(Mutex::new(Hub::new(ScoreStore::new(scores_path))));
    spawn_tick_driver(hub.clone());

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/scores", get(scoreboard))
        .route("/ws", get(upgrade_ws))
        .with_state(hub);

    match locate_client_files() {
        Some(root) => {
            println!("[server] serving client files from {}", root.display());
            let index = root.join("index.html");
            app = app.fallback_service(ServeDir::new(root).not_found_service(ServeFile::new(index)));
        }
        None => eprintln!("[server] no client build found; serving the API only"),
    }

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind server socket");
    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn locate_client_files() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("dist/client"), PathBuf::from("../client/dist")];
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        candidates.insert(0, PathBuf::from(raw));
    }
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn scoreboard(
    State(hub): State<SharedHub>,
    Query(query): Query<ScoreboardQuery>,
) -> impl IntoResponse {
    let limit = query.limit.as_deref().and_then(|raw| raw.parse().ok());
    let hub = hub.lock().await;
    Json(hub.scores.build_response(limit))
}

async fn upgrade_ws(ws: WebSocketUpgrade, State(hub): State<SharedHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(hub, socket))
}

async fn run_connection(hub: SharedHub, socket: WebSocket) {
    let connection_id = alloc_id("conn");
    let (outbox, outbox_rx) = mpsc::channel::<Outbound>(OUTBOX_DEPTH);

    hub.lock().await.connections.insert(
        connection_id.clone(),
        Connection {
            outbox: outbox.clone(),
            member_id: None,
        },
    );

    let (sink, mut source) = socket.split();
    let writer = tokio::spawn(pump_outbound(outbox_rx, sink));

    while let Some(frame) = source.next().await {
        let Ok(frame) = frame else {
            break;
        };
        match frame {
            Message::Text(raw) => dispatch(&hub, &connection_id, raw.as_str()).await,
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => dispatch(&hub, &connection_id, text).await,
                Err(_) => reply_error(&hub, &connection_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut hub = hub.lock().await;
        detach_connection(&mut hub, &connection_id, true);
    }
    drop(outbox);
    let _ = writer.await;
}

async fn pump_outbound(
    mut outbox_rx: mpsc::Receiver<Outbound>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    while let Some(outbound) = outbox_rx.recv().await {
        match outbound {
            Outbound::Frame(payload) => {
                if sink.send(Message::Text(payload.into())).await.is_err() {
                    return;
                }
            }
            Outbound::Bye { code, reason } => {
                let frame = CloseFrame {
                    code,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                return;
            }
        }
    }
}

async fn dispatch(hub: &SharedHub, connection_id: &str, raw: &str) {
    let Some(message) = decode_client_message(raw) else {
        reply_error(hub, connection_id, "invalid message").await;
        return;
    };

    match message {
        ClientMessage::Hello {
            name,
            reconnect_token,
            spectator,
        } => on_hello(hub, connection_id, name, reconnect_token, spectator).await,
        ClientMessage::Ping { t } => {
            let mut hub = hub.lock().await;
            push(
                &mut hub,
                connection_id,
                &json!({ "type": "pong", "t": t }),
                OnBackpressure::Disconnect,
            );
        }
        ClientMessage::Start { level } => on_start(hub, connection_id, level).await,
        ClientMessage::Input { dir } => {
            let mut hub = hub.lock().await;
            match hub.member_id_of(connection_id) {
                Some(member_id) => {
                    if let Some(game) = hub.game.as_mut() {
                        game.receive_input(&member_id, dir);
                    }
                }
                None => push_error(&mut hub, connection_id, "send hello first"),
            }
        }
    }
}

async fn on_hello(
    hub: &SharedHub,
    connection_id: &str,
    requested_name: String,
    reconnect_token: Option<String>,
    wants_spectator: bool,
) {
    let mut hub = hub.lock().await;
    let name = clean_name(&requested_name);

    // A token that matches a known member resumes that identity, seat or
    // spectator slot alike.
    let resumed = reconnect_token
        .as_deref()
        .and_then(|token| member_by_token(&hub, token));
    if let Some(member_id) = resumed {
        if let Some(member) = hub.members.get_mut(&member_id) {
            member.name = name;
            member.connected = true;
        }
        adopt_connection(&mut hub, connection_id, &member_id);

        let holds_seat = hub
            .members
            .get(&member_id)
            .map(|member| !member.spectator)
            .unwrap_or(false);
        if holds_seat {
            if let Some(game) = hub.game.as_mut() {
                if game.has_player(&member_id) {
                    game.set_player_connection(&member_id, true);
                }
            }
        }
        greet(&mut hub, connection_id, &member_id);
        announce_lobby(&mut hub);
        return;
    }

    if !wants_spectator && hub.seat_holder().is_some() {
        push(
            &mut hub,
            connection_id,
            &json!({
                "type": "error",
                "message": "seat is taken; reconnect with your token or join as spectator",
            }),
            OnBackpressure::Disconnect,
        );
        return;
    }

    let member_id = alloc_id("player");
    hub.members.insert(
        member_id.clone(),
        Member {
            id: member_id.clone(),
            name,
            connected: true,
            spectator: wants_spectator,
            reconnect_token: fresh_token(),
        },
    );
    adopt_connection(&mut hub, connection_id, &member_id);
    greet(&mut hub, connection_id, &member_id);
    announce_lobby(&mut hub);
}

async fn on_start(hub: &SharedHub, connection_id: &str, level: Option<i64>) {
    let mut hub = hub.lock().await;
    let Some(member_id) = hub.member_id_of(connection_id) else {
        push_error(&mut hub, connection_id, "send hello first");
        return;
    };
    if hub.game.is_some() {
        return;
    }
    let Some(member) = hub.members.get(&member_id).cloned() else {
        push_error(&mut hub, connection_id, "player is not in lobby");
        return;
    };
    if member.spectator {
        push_error(&mut hub, connection_id, "spectator cannot start");
        return;
    }

    let game = GameEngine::new(
        StartPlayer {
            id: member.id.clone(),
            name: member.name.clone(),
            reconnect_token: member.reconnect_token.clone(),
            connected: member.connected,
        },
        wall_clock_ms() as u32,
        GameEngineOptions {
            starting_level: clamp_level(level),
            invincible_player: false,
        },
    );
    println!(
        "[server] game started by {} (level {})",
        member.name, game.config.starting_level
    );
    let init = game_init_payload(&game, &member.id);
    hub.game = Some(game);
    fan_out(&mut hub, &init, OnBackpressure::Disconnect);
}

fn detach_connection(hub: &mut Hub, connection_id: &str, announce: bool) {
    let Some(connection) = hub.connections.remove(connection_id) else {
        return;
    };
    let Some(member_id) = connection.member_id else {
        return;
    };

    // A superseded connection no longer owns the member; leave it alone.
    let is_live = hub
        .live_connection_of
        .get(&member_id)
        .map(|live| live == connection_id)
        .unwrap_or(false);
    if !is_live {
        return;
    }
    hub.live_connection_of.remove(&member_id);

    let game_running = hub.game.is_some();
    let mut forget_member = true;
    if let Some(member) = hub.members.get_mut(&member_id) {
        if game_running && !member.spectator {
            // The built-in AI keeps the seat warm until the token comes back.
            member.connected = false;
            forget_member = false;
            if let Some(game) = hub.game.as_mut() {
                if game.has_player(&member_id) {
                    game.set_player_connection(&member_id, false);
                }
            }
        }
    }
    if forget_member {
        hub.members.remove(&member_id);
    }

    if announce {
        announce_lobby(hub);
    }
}

fn adopt_connection(hub: &mut Hub, connection_id: &str, member_id: &str) {
    // Kick whichever connection previously spoke for this member.
    if let Some(stale_id) = hub.live_connection_of.get(member_id).cloned() {
        if stale_id != connection_id {
            if let Some(stale) = hub.connections.get_mut(&stale_id) {
                stale.member_id = None;
                let _ = stale.outbox.try_send(Outbound::Bye {
                    code: 4001,
                    reason: "superseded by new connection".to_string(),
                });
            }
        }
    }

    let previous = hub
        .connections
        .get(connection_id)
        .and_then(|conn| conn.member_id.clone());
    if let Some(previous) = previous {
        if previous != member_id {
            hub.live_connection_of.remove(&previous);
        }
    }

    if let Some(connection) = hub.connections.get_mut(connection_id) {
        connection.member_id = Some(member_id.to_string());
    }
    hub.live_connection_of
        .insert(member_id.to_string(), connection_id.to_string());
}

fn greet(hub: &mut Hub, connection_id: &str, member_id: &str) {
    let Some(member) = hub.members.get(member_id).cloned() else {
        return;
    };
    push(
        hub,
        connection_id,
        &json!({
            "type": "welcome",
            "playerId": member.id,
            "reconnectToken": member.reconnect_token,
            "isSpectator": member.spectator,
        }),
        OnBackpressure::Disconnect,
    );

    // Joining mid-game also gets the world and the latest state immediately.
    let payloads = hub.game.as_mut().map(|game| {
        (
            game_init_payload(game, &member.id),
            state_payload(game.build_snapshot(false)),
        )
    });
    if let Some((init, state)) = payloads {
        push(hub, connection_id, &init, OnBackpressure::Disconnect);
        push(hub, connection_id, &state, OnBackpressure::Disconnect);
    }
}

fn announce_lobby(hub: &mut Hub) {
    let mut roster: Vec<&Member> = hub.members.values().collect();
    roster.sort_by(|a, b| a.name.cmp(&b.name));
    let payload = json!({
        "type": "lobby",
        "players": roster
            .iter()
            .map(|member| {
                json!({
                    "id": member.id,
                    "name": member.name,
                    "connected": member.connected,
                    "spectator": member.spectator,
                })
            })
            .collect::<Vec<Value>>(),
        "running": hub.game.is_some(),
        "spectatorCount": roster.iter().filter(|member| member.spectator).count(),
    });
    fan_out(hub, &payload, OnBackpressure::Disconnect);
}

fn game_init_payload(game: &GameEngine, player_id: &str) -> Value {
    json!({
        "type": "game_init",
        "playerId": player_id,
        "world": game.get_world_init(),
        "config": game.config,
        "startedAtMs": game.started_at_ms,
        "seed": game.seed(),
    })
}

fn state_payload(snapshot: Snapshot) -> Value {
    json!({
        "type": "state",
        "snapshot": snapshot,
    })
}

fn spawn_tick_driver(hub: SharedHub) {
    tokio::spawn(async move {
        let mut clock = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            clock.tick().await;
            let mut hub = hub.lock().await;
            advance_game(&mut hub);
        }
    });
}

fn advance_game(hub: &mut Hub) {
    if hub.game.is_none() {
        return;
    }

    let state = {
        let game = hub.game.as_mut().expect("checked above");
        if let Err(tick_error) = game.step(TICK_MS) {
            eprintln!("[server] tick failed, aborting game: {tick_error}");
            game.abort();
        }
        state_payload(game.build_snapshot(true))
    };
    fan_out(hub, &state, OnBackpressure::DropFrame);

    let ended = hub
        .game
        .as_ref()
        .map(|game| game.is_ended())
        .unwrap_or(false);
    if !ended {
        return;
    }

    let summary = hub.game.as_ref().expect("checked above").build_summary();
    let player_name = hub
        .seat_holder()
        .map(|member| member.name.clone())
        .unwrap_or_else(|| "Player".to_string());
    hub.scores.record_game(&player_name, &summary);
    fan_out(
        hub,
        &json!({ "type": "game_over", "summary": summary }),
        OnBackpressure::Disconnect,
    );
    hub.game = None;
    announce_lobby(hub);
}

fn push(hub: &mut Hub, connection_id: &str, payload: &Value, policy: OnBackpressure) {
    let overflowed = hub
        .connections
        .get(connection_id)
        .map(|conn| {
            conn.outbox
                .try_send(Outbound::Frame(payload.to_string()))
                .is_err()
        })
        .unwrap_or(false);
    if overflowed && policy == OnBackpressure::Disconnect {
        detach_connection(hub, connection_id, false);
    }
}

fn push_error(hub: &mut Hub, connection_id: &str, message: &str) {
    push(
        hub,
        connection_id,
        &json!({ "type": "error", "message": message }),
        OnBackpressure::Disconnect,
    );
}

async fn reply_error(hub: &SharedHub, connection_id: &str, message: &str) {
    let mut hub = hub.lock().await;
    push_error(&mut hub, connection_id, message);
}

fn fan_out(hub: &mut Hub, payload: &Value, policy: OnBackpressure) {
    let frame = payload.to_string();
    let mut overflowed = Vec::new();
    for (connection_id, connection) in &hub.connections {
        // Only the live connection of a known member receives broadcasts.
        let Some(member_id) = connection.member_id.as_ref() else {
            continue;
        };
        if hub.live_connection_of.get(member_id) != Some(connection_id) {
            continue;
        }
        if !hub.members.contains_key(member_id) {
            continue;
        }
        if connection
            .outbox
            .try_send(Outbound::Frame(frame.clone()))
            .is_err()
        {
            overflowed.push(connection_id.clone());
        }
    }
    if policy == OnBackpressure::Disconnect {
        for connection_id in overflowed {
            detach_connection(hub, &connection_id, false);
        }
    }
}

fn member_by_token(hub: &Hub, token: &str) -> Option<String> {
    hub.members
        .values()
        .find(|member| member.reconnect_token == token)
        .map(|member| member.id.clone())
}

fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(NAME_MAX_CHARS).collect()
}

fn clamp_level(level: Option<i64>) -> Option<u32> {
    level.map(|level| level.clamp(1, 25) as u32)
}

fn alloc_id(prefix: &str) -> String {
    format!("{prefix}_{}", ID_SEQ.fetch_add(1, Ordering::Relaxed))
}

fn fresh_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(TOKEN_CHARS)
        .map(char::from)
        .collect()
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
