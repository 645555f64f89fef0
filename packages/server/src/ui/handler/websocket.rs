//! WebSocket connection handlers.
//!
//! One upgraded connection is bound to one room for its whole lifetime:
//!
//! ```text
//! Open (registered, reading) → Closing (deregister, release) → Closed
//! ```
//!
//! There is no reconnection; a client opens a new connection instead.

use std::{error::Error as StdError, io, sync::Arc};

use axum::{
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionHandle, ConnectionState, RoomId},
    ui::{signal::wait_for_shutdown, state::AppState},
};

/// Messages buffered per connection before fan-out starts dropping for it
const OUTBOUND_BUFFER: usize = 256;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    tracing::info!("WS request for Room ID: {}", room_id);

    let room_id = match RoomId::try_from(room_id) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Rejecting WebSocket request: {}", e);
            return Err((StatusCode::BAD_REQUEST, "Room ID is required"));
        }
    };

    Ok(ws
        .on_failed_upgrade(|e| tracing::warn!("Failed to upgrade connection: {}", e))
        .on_upgrade(move |socket| handle_socket(socket, state, room_id)))
}

/// `/ws` without a room id
pub async fn missing_room_id() -> (StatusCode, &'static str) {
    tracing::warn!("Room ID is required");
    (StatusCode::BAD_REQUEST, "Room ID is required")
}

/// Spawns a task that receives payloads from the rx channel and pushes them to the WebSocket sender.
///
/// The task ends when the channel closes or a write fails.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sender.send(Message::Text(payload.into())).await {
                tracing::warn!("Failed to write message: {}", e);
                break;
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: RoomId) {
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let handle = ConnectionHandle::new(tx);

    let mut connection_state = ConnectionState::Open;
    state
        .connect_client_usecase
        .execute(&room_id, handle.clone())
        .await;

    let mut recv_task = tokio::spawn(read_loop(receiver, state.clone(), room_id.clone()));
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
        _ = wait_for_shutdown(state.shutdown.clone()) => {
            tracing::debug!("Closing connection '{}' for shutdown", handle.id());
            recv_task.abort();
            send_task.abort();
        }
    }

    connection_state = connection_state.advance();
    tracing::debug!(
        "Connection '{}' for room '{}' is {:?}",
        handle.id(),
        room_id,
        connection_state
    );
    state
        .disconnect_client_usecase
        .execute(&room_id, &handle)
        .await;

    connection_state = connection_state.advance();
    tracing::info!(
        "Connection '{}' for room '{}' is {:?}",
        handle.id(),
        room_id,
        connection_state
    );
}

/// Reads client frames and forwards text to the room until the connection ends.
async fn read_loop(mut receiver: SplitStream<WebSocket>, state: Arc<AppState>, room_id: RoomId) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                if is_abnormal_closure(&e) {
                    tracing::debug!("Connection for room '{}' closed abnormally: {}", room_id, e);
                } else {
                    tracing::error!("WebSocket error: {}", e);
                }
                break;
            }
        };

        match msg {
            Message::Text(text) => forward(&state, &room_id, text.as_str()).await,
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => forward(&state, &room_id, text).await,
                Err(_) => tracing::warn!("Ignoring non UTF-8 binary frame for room '{}'", room_id),
            },
            Message::Close(frame) => {
                log_close(&room_id, frame.as_ref());
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                tracing::debug!("Received ping/pong");
            }
        }
    }
}

async fn forward(state: &AppState, room_id: &RoomId, body: &str) {
    tracing::debug!("Received text for room '{}': {}", room_id, body);
    // 失敗してもループは継続する
    if let Err(e) = state
        .forward_client_message_usecase
        .execute(room_id, body)
        .await
    {
        tracing::warn!("Failed to send message to room '{}': {}", room_id, e);
    }
}

fn log_close(room_id: &RoomId, frame: Option<&CloseFrame>) {
    match frame {
        Some(frame) if !is_expected_close_code(frame.code) => tracing::warn!(
            "Connection for room '{}' closed with code {}: {}",
            room_id,
            frame.code,
            frame.reason.as_str()
        ),
        _ => tracing::info!("Client for room '{}' requested close", room_id),
    }
}

/// Close codes treated as a normal end of the connection
fn is_expected_close_code(code: u16) -> bool {
    matches!(
        code,
        close_code::NORMAL | close_code::AWAY | close_code::ABNORMAL
    )
}

/// Whether a read error only means the peer went away without a close handshake
fn is_abnormal_closure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if e.to_string().contains("without closing handshake") {
            return true;
        }
        current = e.source();
    }
    false
}
