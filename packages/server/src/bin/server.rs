//! Matrix ⇄ WebSocket bridge.
//!
//! Receives events pushed by the homeserver, relays chat messages to the
//! browser clients connected to `/ws/{room_id}`, and sends what those clients
//! type back into the room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-server
//! cargo run --bin kakehashi-server -- --host 0.0.0.0 --port 1237
//! ```

use std::sync::Arc;

use clap::Parser;
use kakehashi_server::{
    config::Args,
    domain::ConnectionRegistry,
    infrastructure::{
        encoder::JsonRelayEncoder, protocol::MatrixClient, registry::WebSocketConnectionRegistry,
        repository::SqliteRoomRepository,
    },
    ui::{
        Server,
        signal::{shutdown_signal, wait_for_shutdown},
        state::{AppState, Dependencies},
    },
    usecase::relay_queue,
};
use kakehashi_shared::{logger::setup_logger, time::SystemClock};
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Repository
    // 2. Registry + relay queue
    // 3. Protocol client
    // 4. AppState
    // 5. Broadcaster + Server

    // 1. Room Store（起動できなければ終了）
    let repository = match SqliteRoomRepository::open(&args.database) {
        Ok(repository) => Arc::new(repository),
        Err(e) => {
            tracing::error!("Failed to open room database: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Connection Registry と Relay キュー（JSON ペイロード）
    let registry: Arc<dyn ConnectionRegistry> = Arc::new(WebSocketConnectionRegistry::new());
    let (queue, broadcaster) = relay_queue(
        args.relay_queue_capacity,
        args.enqueue_timeout(),
        registry.clone(),
        Arc::new(JsonRelayEncoder),
    );

    // 3. homeserver クライアント
    let homeserver_url = match args.homeserver_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Sending to homeserver {} as {}",
        homeserver_url,
        args.user_id
    );
    let protocol_client = Arc::new(MatrixClient::new(
        homeserver_url,
        args.as_token.clone(),
        args.user_id.clone(),
    ));

    // 4. AppState
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app_state = AppState::new(Dependencies {
        repository,
        registry,
        protocol_client,
        relay_queue: queue,
        clock: Arc::new(SystemClock),
        hs_token: args.hs_token.clone(),
        shutdown: shutdown_rx.clone(),
    });

    // 5. Broadcaster と Server
    let broadcaster_task = tokio::spawn(broadcaster.run(wait_for_shutdown(shutdown_rx)));
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let server = Server::new(app_state);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = broadcaster_task.await {
        tracing::warn!("Relay broadcaster task failed: {}", e);
    }
}
