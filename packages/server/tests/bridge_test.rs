//! Integration tests for the bridge, driving the real router in-process.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures_util::{SinkExt, StreamExt};
use kakehashi_server::{
    domain::{
        ConnectionHandle, ConnectionRegistry, ProtocolClient, ProtocolError, RoomId,
        RoomRepository,
    },
    infrastructure::{
        encoder::JsonRelayEncoder, registry::WebSocketConnectionRegistry,
        repository::SqliteRoomRepository,
    },
    ui::{
        router,
        signal::wait_for_shutdown,
        state::{AppState, Dependencies},
    },
    usecase::{RelayBroadcaster, relay_queue},
};
use kakehashi_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tower::ServiceExt;

const HS_TOKEN: &str = "hs-secret";

/// Records every successful outgoing send instead of talking to a homeserver
#[derive(Default)]
struct RecordingProtocolClient {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl RecordingProtocolClient {
    /// Rejects the first `failures` sends, then records as usual
    fn failing_first(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProtocolClient for RecordingProtocolClient {
    async fn send_message(&self, room_id: &RoomId, body: &str) -> Result<(), ProtocolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProtocolError::Rejected {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.sent
            .lock()
            .await
            .push((room_id.as_str().to_string(), body.to_string()));
        Ok(())
    }
}

struct TestBridge {
    state: Arc<AppState>,
    repository: Arc<SqliteRoomRepository>,
    registry: Arc<WebSocketConnectionRegistry>,
    protocol: Arc<RecordingProtocolClient>,
    shutdown: watch::Sender<bool>,
}

impl TestBridge {
    fn new() -> Self {
        Self::with_protocol(RecordingProtocolClient::default())
    }

    fn with_protocol(protocol: RecordingProtocolClient) -> Self {
        let (bridge, broadcaster) = Self::build(protocol, 64, Duration::from_millis(500));
        bridge.start_broadcaster(broadcaster);
        bridge
    }

    /// Build the bridge without starting the broadcaster
    fn build(
        protocol: RecordingProtocolClient,
        relay_capacity: usize,
        enqueue_timeout: Duration,
    ) -> (Self, RelayBroadcaster) {
        let repository = Arc::new(SqliteRoomRepository::in_memory().unwrap());
        let registry = Arc::new(WebSocketConnectionRegistry::new());
        let protocol = Arc::new(protocol);
        let (queue, broadcaster) = relay_queue(
            relay_capacity,
            enqueue_timeout,
            registry.clone(),
            Arc::new(JsonRelayEncoder),
        );
        let (shutdown, shutdown_rx) = watch::channel(false);

        let state = Arc::new(AppState::new(Dependencies {
            repository: repository.clone(),
            registry: registry.clone(),
            protocol_client: protocol.clone(),
            relay_queue: queue,
            clock: Arc::new(SystemClock),
            hs_token: HS_TOKEN.to_string(),
            shutdown: shutdown_rx,
        }));

        let bridge = Self {
            state,
            repository,
            registry,
            protocol,
            shutdown,
        };
        (bridge, broadcaster)
    }

    fn start_broadcaster(&self, broadcaster: RelayBroadcaster) {
        tokio::spawn(broadcaster.run(wait_for_shutdown(self.shutdown.subscribe())));
    }

    /// Serve the router on an ephemeral port
    async fn serve(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(self.state.clone());
        let shutdown = wait_for_shutdown(self.shutdown.subscribe());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
                .unwrap();
        });
        addr
    }

    async fn oneshot(&self, request: Request<Body>) -> axum::response::Response {
        router(self.state.clone()).oneshot(request).await.unwrap()
    }

    async fn wait_for_connections(&self, room: &str, expected: usize) {
        let room_id = RoomId::new(room.to_string()).unwrap();
        for _ in 0..100 {
            if self.registry.connection_count(&room_id).await == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room {room} never reached {expected} connection(s)");
    }
}

fn event(event_type: &str, room: &str, content: Value) -> Value {
    json!({
        "type": event_type,
        "room_id": room,
        "sender": "@u:server",
        "state_key": "",
        "content": content,
    })
}

async fn push_events(addr: SocketAddr, txn_id: &str, events: Vec<Value>) {
    let response = reqwest::Client::new()
        .put(format!("http://{addr}/_matrix/app/v1/transactions/{txn_id}"))
        .bearer_auth(HS_TOKEN)
        .json(&json!({ "events": events }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn test_end_to_end_relay_scenario() {
    // テスト項目: 作成 → 名前変更 → 接続 → 受信 → 送信 → 切断 の一連の流れ
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    let room_id = RoomId::new("!abc".to_string()).unwrap();

    // (1) room-created
    push_events(addr, "t1", vec![event("m.room.create", "!abc", json!({}))]).await;
    let created = bridge.repository.fetch(&room_id).await.unwrap().unwrap();
    assert!(created.name.is_empty());

    // (2) room-name-changed
    push_events(addr, "t2", vec![event("m.room.name", "!abc", json!({"name": "Lobby"}))]).await;
    let renamed = bridge.repository.fetch(&room_id).await.unwrap().unwrap();
    assert_eq!(renamed.name.as_str(), "Lobby");
    assert_eq!(renamed.created_at, created.created_at);

    // (3) client connects and receives a chat message
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    bridge.wait_for_connections("!abc", 1).await;
    push_events(
        addr,
        "t3",
        vec![event("m.room.message", "!abc", json!({"msgtype": "m.text", "body": "hi"}))],
    )
    .await;
    let received = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let payload: Value = serde_json::from_str(received.to_text().unwrap()).unwrap();
    assert_eq!(
        payload,
        json!({"body": "hi", "user": "@u:server", "room_id": "!abc"})
    );

    // (4) client sends text, which is forwarded to the room
    socket.send(Message::text("reply")).await.unwrap();
    let mut forwarded = Vec::new();
    for _ in 0..100 {
        forwarded = bridge.protocol.sent.lock().await.clone();
        if !forwarded.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(forwarded, vec![("!abc".to_string(), "reply".to_string())]);

    // (5) client disconnects and is deregistered
    socket.close(None).await.unwrap();
    bridge.wait_for_connections("!abc", 0).await;
    push_events(
        addr,
        "t4",
        vec![event("m.room.message", "!abc", json!({"msgtype": "m.text", "body": "gone"}))],
    )
    .await;
    assert_eq!(bridge.registry.fan_out(&room_id, "check").await.delivered(), 0);

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_messages_for_same_room_arrive_in_order() {
    // テスト項目: 同じ Room のメッセージは投入順にクライアントへ届く
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    bridge.wait_for_connections("!abc", 1).await;

    // when (操作):
    let events = (0..5)
        .map(|i| event("m.room.message", "!abc", json!({"body": format!("m{i}")})))
        .collect();
    push_events(addr, "order", events).await;

    // then (期待する結果):
    for i in 0..5 {
        let received = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let payload: Value = serde_json::from_str(received.to_text().unwrap()).unwrap();
        assert_eq!(payload["body"], format!("m{i}"));
    }

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_message_before_room_created_is_still_relayed() {
    // テスト項目: room-created より先に届いたメッセージも配送される
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/!new")).await.unwrap();
    bridge.wait_for_connections("!new", 1).await;

    // when (操作):
    push_events(
        addr,
        "mixed",
        vec![
            event("m.room.message", "!new", json!({"body": "early"})),
            event("m.room.create", "!new", json!({})),
        ],
    )
    .await;

    // then (期待する結果):
    let received = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(received.to_text().unwrap().contains("early"));
    let room_id = RoomId::new("!new".to_string()).unwrap();
    assert!(bridge.repository.fetch(&room_id).await.unwrap().is_some());

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    // テスト項目: シャットダウンで接続が閉じられ、Registry から解除される
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    bridge.wait_for_connections("!abc", 1).await;

    // when (操作):
    bridge.shutdown.send(true).unwrap();

    // then (期待する結果):
    bridge.wait_for_connections("!abc", 0).await;
    let next = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap();
    assert!(!matches!(next, Some(Ok(Message::Text(_)))));
}

#[tokio::test]
async fn test_list_rooms_returns_records() {
    // テスト項目: GET /api/rooms が Room の配列を返す
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    push_events(
        addr,
        "rooms",
        vec![
            event("m.room.create", "!abc", json!({})),
            event("m.room.name", "!abc", json!({"name": "Lobby"})),
        ],
    )
    .await;

    // when (操作):
    let rooms: Vec<Value> = reqwest::get(format!("http://{addr}/api/rooms"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], "!abc");
    assert_eq!(rooms[0]["name"], "Lobby");
    assert!(rooms[0]["created_at"].is_string());
    assert!(rooms[0]["updated_at"].is_string());

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_list_rooms_rejects_non_get() {
    // テスト項目: GET 以外のメソッドは 405
    // given (前提条件):
    let bridge = TestBridge::new();

    // when (操作):
    let response = bridge
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rooms")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    // then (期待する結果):
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_websocket_without_room_id_is_bad_request() {
    // テスト項目: Room ID のない WebSocket リクエストは 400
    // given (前提条件):
    let bridge = TestBridge::new();

    for uri in ["/ws", "/ws/"] {
        // when (操作):
        let response = bridge
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;

        // then (期待する結果):
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn test_transaction_requires_homeserver_token() {
    // テスト項目: トークンなしは 401、誤ったトークンは 403
    // given (前提条件):
    let bridge = TestBridge::new();
    let body = json!({"events": []}).to_string();

    // when (操作):
    let missing = bridge
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/_matrix/app/v1/transactions/t1")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await;
    let wrong = bridge
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/_matrix/app/v1/transactions/t1?access_token=nope")
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    // then (期待する結果):
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_transaction_is_processed_once() {
    // テスト項目: 同じトランザクション ID の再送は処理されない
    // given (前提条件):
    let bridge = TestBridge::new();
    let room_id = RoomId::new("!abc".to_string()).unwrap();
    let send = |body: Value| {
        Request::builder()
            .method("PUT")
            .uri("/transactions/dup")
            .header("authorization", format!("Bearer {HS_TOKEN}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    let first = json!({"events": [event("m.room.create", "!abc", json!({}))]});
    let retry = json!({"events": [event("m.room.name", "!abc", json!({"name": "Lobby"}))]});

    // when (操作):
    let first_response = bridge.oneshot(send(first)).await;
    let retry_response = bridge.oneshot(send(retry)).await;

    // then (期待する結果): 2 回目の内容は反映されない
    assert_eq!(first_response.status(), StatusCode::OK);
    assert_eq!(retry_response.status(), StatusCode::OK);
    let stored = bridge.repository.fetch(&room_id).await.unwrap().unwrap();
    assert!(stored.name.is_empty());
}

#[tokio::test]
async fn test_malformed_events_are_skipped() {
    // テスト項目: 不正なイベントは読み飛ばされ、残りのイベントは処理される
    // given (前提条件):
    let bridge = TestBridge::new();
    let body = json!({"events": [
        {"type": "m.room.create", "sender": "@u:server"},
        event("m.room.create", "!ok", json!({})),
    ]});

    // when (操作):
    let response = bridge
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/_matrix/app/v1/transactions/bad")
                .header("authorization", format!("Bearer {HS_TOKEN}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;

    // then (期待する結果):
    assert_eq!(response.status(), StatusCode::OK);
    let rooms = bridge.repository.list().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id.as_str(), "!ok");
}

#[tokio::test]
async fn test_health_check() {
    // テスト項目: GET /api/health が ok を返す
    // given (前提条件):
    let bridge = TestBridge::new();

    // when (操作):
    let response = bridge
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await;

    // then (期待する結果):
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_list_rooms_filters_by_name() {
    // テスト項目: ?name= で Room 名の部分一致検索ができる
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    push_events(
        addr,
        "filter",
        vec![
            event("m.room.create", "!a", json!({})),
            event("m.room.name", "!a", json!({"name": "Lobby"})),
            event("m.room.create", "!b", json!({})),
            event("m.room.name", "!b", json!({"name": "Random"})),
        ],
    )
    .await;

    // when (操作):
    let rooms: Vec<Value> = reqwest::get(format!("http://{addr}/api/rooms?name=obb"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], "!a");

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_debug_connections_reports_live_connections() {
    // テスト項目: GET /debug/connections が Room ごとの接続数を返す
    // given (前提条件):
    let bridge = TestBridge::new();
    let addr = bridge.serve().await;
    let (_first, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    let (_second, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    bridge.wait_for_connections("!abc", 2).await;

    // when (操作):
    let rooms: Vec<Value> = reqwest::get(format!("http://{addr}/debug/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(rooms, vec![json!({"room_id": "!abc", "connections": 2})]);

    bridge.shutdown.send(true).unwrap();
}

fn transaction_request(txn_id: &str, events: Vec<Value>) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/_matrix/app/v1/transactions/{txn_id}"))
        .header("authorization", format!("Bearer {HS_TOKEN}"))
        .body(Body::from(json!({ "events": events }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_abandoned_transaction_is_processed_again_on_retry() {
    // テスト項目: homeserver が途中で諦めたトランザクションは、再送時に全イベントが処理される
    // given (前提条件): 容量 1 の Relay キューで Broadcaster が止まっている
    let (bridge, broadcaster) =
        TestBridge::build(RecordingProtocolClient::default(), 1, Duration::from_millis(500));
    let room_id = RoomId::new("!abc".to_string()).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    bridge.registry.register(&room_id, ConnectionHandle::new(tx)).await;
    let messages = || {
        (0..3)
            .map(|i| event("m.room.message", "!abc", json!({"body": format!("m{i}")})))
            .collect::<Vec<_>>()
    };

    // when (操作): 1 回目はキュー待ちの途中で打ち切られ、Broadcaster 起動後に再送される
    let first = tokio::time::timeout(
        Duration::from_millis(100),
        bridge.oneshot(transaction_request("t1", messages())),
    )
    .await;
    bridge.start_broadcaster(broadcaster);
    let retry = bridge
        .oneshot(transaction_request("t1", messages()))
        .await;

    // then (期待する結果): 打ち切られた分も含め、3 件すべてが配送される
    assert!(first.is_err());
    assert_eq!(retry.status(), StatusCode::OK);
    let mut bodies = Vec::new();
    while !bodies.iter().any(|body| body == "m2") {
        let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let payload: Value = serde_json::from_str(&payload).unwrap();
        bodies.push(payload["body"].as_str().unwrap().to_string());
    }
    for expected in ["m0", "m1", "m2"] {
        assert!(bodies.iter().any(|body| body == expected), "{expected} missing from {bodies:?}");
    }

    // 処理を終えた後の再送は処理し直さない
    let replay = bridge
        .oneshot(transaction_request("t1", messages()))
        .await;
    assert_eq!(replay.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());

    bridge.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn test_failed_forward_keeps_connection_open() {
    // テスト項目: homeserver への送信に失敗しても読み取りループは続き、接続は登録されたまま
    // given (前提条件): 最初の送信だけ失敗する homeserver
    let bridge = TestBridge::with_protocol(RecordingProtocolClient::failing_first(1));
    let addr = bridge.serve().await;
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/!abc")).await.unwrap();
    bridge.wait_for_connections("!abc", 1).await;

    // when (操作):
    socket.send(Message::text("lost")).await.unwrap();
    socket.send(Message::text("kept")).await.unwrap();

    // then (期待する結果):
    let mut sent = Vec::new();
    for _ in 0..100 {
        sent = bridge.protocol.sent.lock().await.clone();
        if !sent.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sent, vec![("!abc".to_string(), "kept".to_string())]);
    assert_eq!(bridge.protocol.attempts.load(Ordering::SeqCst), 2);
    let room_id = RoomId::new("!abc".to_string()).unwrap();
    assert_eq!(bridge.registry.connection_count(&room_id).await, Some(1));

    // 接続は引き続き Relay を受け取れる
    push_events(
        addr,
        "after-failure",
        vec![event("m.room.message", "!abc", json!({"body": "still here"}))],
    )
    .await;
    let received = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(received.to_text().unwrap().contains("still here"));

    bridge.shutdown.send(true).unwrap();
}
