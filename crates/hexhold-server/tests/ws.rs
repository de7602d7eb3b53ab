//! WebSocket surface tests over real sockets: the join framing protocol,
//! close codes, and a full start-and-capture exchange.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use hexhold_server::auth::RegisteredPlayer;
use hexhold_server::http::{self, AppState};
use hexhold_server::rooms::game::AllowedPlayer;
use hexhold_server::{Auth, GameData, Kv, KvPool, MemoryKv, RoomRegistry, ServerConfig};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    data: GameData,
    auth: Arc<Auth>,
    registry: RoomRegistry,
}

async fn boot() -> TestServer {
    let cfg = ServerConfig::default();
    let store = MemoryKv::new();
    let kv = Kv::new(
        KvPool::new(store.connections(cfg.pool_size)),
        cfg.command_timeout,
    );
    let data = GameData::new(kv, cfg.game.clone());
    let auth = Arc::new(Auth::new(b"test-secret".to_vec()));
    let registry = RoomRegistry::new(data.clone(), Arc::clone(&auth), cfg);

    let state = AppState {
        data: data.clone(),
        auth: Arc::clone(&auth),
        registry: registry.clone(),
    };
    let app = http::router(state, std::env::temp_dir());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        data,
        auth,
        registry,
    }
}

async fn connect(server: &TestServer, room_id: &str) -> WsClient {
    let url = format!("ws://{}/ws/{}", server.addr, room_id);
    let (ws, _) = connect_async(url).await.expect("websocket handshake");
    ws
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON; panics on close.
async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame within timeout")
            .expect("socket closed")
            .expect("socket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Skip frames until one with the given `type`.
async fn recv_until(ws: &mut WsClient, kind: &str) -> Value {
    for _ in 0..100 {
        let value = recv_json(ws).await;
        if value["type"] == kind {
            return value;
        }
    }
    panic!("no {kind} frame within 100 messages");
}

/// Wait for a close frame, returning its code.
async fn recv_close(ws: &mut WsClient) -> u16 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame within timeout")
            .expect("socket closed without close frame")
            .expect("socket error");
        if let Message::Close(Some(frame)) = msg {
            return u16::from(frame.code);
        }
    }
}

async fn register(server: &TestServer, username: &str) -> RegisteredPlayer {
    server.auth.register(&server.data, username).await.unwrap()
}

fn join_frame(player: &RegisteredPlayer) -> Value {
    json!({
        "type": "join",
        "playerId": player.player_id.clone(),
        "token": player.token.clone(),
    })
}

#[tokio::test]
async fn unknown_room_fails_the_handshake() {
    let server = boot().await;
    let url = format!("ws://{}/ws/no-such-room", server.addr);
    assert!(connect_async(url).await.is_err());
}

#[tokio::test]
async fn join_and_capture_over_the_wire() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let room = server
        .registry
        .create_game_room(vec![AllowedPlayer {
            id: alice.player_id.clone(),
            color: alice.color.clone(),
        }])
        .await
        .unwrap();

    let mut ws = connect(&server, room.id.as_str()).await;
    send_json(&mut ws, join_frame(&alice)).await;

    let assigned = recv_json(&mut ws).await;
    assert_eq!(assigned["type"], "assignedColor");
    assert_eq!(assigned["color"], alice.color);

    let history = recv_until(&mut ws, "history").await;
    assert!(history["hexes"].is_array());

    let lst = recv_until(&mut ws, "lobbyStartTime").await;
    assert_eq!(lst["startDelay"], 5000);

    // Start pick, far from any generated terrain.
    send_json(&mut ws, json!({"type": "chooseStart", "q": 200, "r": 0})).await;
    let result = recv_until(&mut ws, "fillResult").await;
    assert_eq!(result["ok"], true);

    // First capture: 200 - 17.
    send_json(&mut ws, json!({"type": "clickHex", "q": 201, "r": 0})).await;
    let points = recv_until(&mut ws, "pointsUpdate").await;
    assert_eq!(points["points"], 183);
    assert_eq!(points["tiles"], 2);
    let result = recv_until(&mut ws, "fillResult").await;
    assert_eq!(result["ok"], true);

    // Batch with one good and one unaffordable-free mix still answers
    // per-hex.
    send_json(
        &mut ws,
        json!({"type": "batchFillHex", "hexes": [{"q": 202, "r": 0}, {"q": 202, "r": 0}]}),
    )
    .await;
    let batch = recv_until(&mut ws, "batchFillResult").await;
    let results = batch["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["ok"], true);
    // The second attempt hits a tile the player now owns.
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[1]["reason"], "insufficient");
}

#[tokio::test]
async fn first_frame_must_be_a_join() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let room = server
        .registry
        .create_game_room(vec![AllowedPlayer {
            id: alice.player_id.clone(),
            color: alice.color.clone(),
        }])
        .await
        .unwrap();

    let mut ws = connect(&server, room.id.as_str()).await;
    send_json(&mut ws, json!({"type": "clickHex", "q": 0, "r": 0})).await;
    assert_eq!(recv_close(&mut ws).await, 1000);
}

#[tokio::test]
async fn outsider_is_closed_with_1003() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let mallory = register(&server, "Mallory").await;
    let room = server
        .registry
        .create_game_room(vec![AllowedPlayer {
            id: alice.player_id.clone(),
            color: alice.color.clone(),
        }])
        .await
        .unwrap();

    let mut ws = connect(&server, room.id.as_str()).await;
    send_json(&mut ws, join_frame(&mallory)).await;
    assert_eq!(recv_close(&mut ws).await, 1003);
}

#[tokio::test]
async fn duplicate_session_closes_the_old_socket() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let room = server
        .registry
        .create_game_room(vec![AllowedPlayer {
            id: alice.player_id.clone(),
            color: alice.color.clone(),
        }])
        .await
        .unwrap();

    let mut first = connect(&server, room.id.as_str()).await;
    send_json(&mut first, join_frame(&alice)).await;
    let assigned = recv_json(&mut first).await;
    assert_eq!(assigned["type"], "assignedColor");

    let mut second = connect(&server, room.id.as_str()).await;
    send_json(&mut second, join_frame(&alice)).await;
    let assigned = recv_json(&mut second).await;
    assert_eq!(assigned["type"], "assignedColor");

    assert_eq!(recv_close(&mut first).await, 1000);
}

#[tokio::test]
async fn invalid_token_is_closed_with_1000() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let room = server
        .registry
        .create_game_room(vec![AllowedPlayer {
            id: alice.player_id.clone(),
            color: alice.color.clone(),
        }])
        .await
        .unwrap();

    let mut ws = connect(&server, room.id.as_str()).await;
    send_json(
        &mut ws,
        json!({"type": "join", "playerId": alice.player_id.clone(), "token": "deadbeef"}),
    )
    .await;
    assert_eq!(recv_close(&mut ws).await, 1000);
}

#[tokio::test]
async fn lobby_over_the_wire_reaches_start_game() {
    let server = boot().await;
    let alice = register(&server, "Alice").await;
    let bob = register(&server, "Bob").await;
    let lobby = server.registry.find_or_create_lobby().await.unwrap();

    let mut a = connect(&server, lobby.id.as_str()).await;
    send_json(&mut a, join_frame(&alice)).await;
    let mut b = connect(&server, lobby.id.as_str()).await;
    send_json(&mut b, join_frame(&bob)).await;

    let roster = recv_until(&mut a, "lobbyRoster").await;
    assert!(roster["players"].is_array());

    send_json(&mut a, json!({"type": "joinGame"})).await;
    send_json(&mut b, json!({"type": "joinGame"})).await;

    // 1 s countdown ticks in real time: 5..0 then the handoff.
    let start = recv_until(&mut a, "startGame").await;
    let room_id = start["roomId"].as_str().unwrap();
    assert!(server.registry.get(room_id).is_some());

    let start_b = recv_until(&mut b, "startGame").await;
    assert_eq!(start_b["roomId"], start["roomId"]);
}
