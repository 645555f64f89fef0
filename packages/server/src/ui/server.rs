//! Server execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{any, get, put},
};
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        appservice::push_transaction,
        http::{debug_connections, health_check, list_rooms},
        websocket::{missing_room_id, websocket_handler},
    },
    signal::wait_for_shutdown,
    state::AppState,
};

/// Build the router for the bridge
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket エンドポイント
        .route("/ws/{room_id}", get(websocket_handler))
        .route("/ws", any(missing_room_id))
        .route("/ws/", any(missing_room_id))
        // HTTP エンドポイント
        .route("/api/rooms", get(list_rooms))
        .route("/api/health", get(health_check))
        .route("/debug/connections", get(debug_connections))
        // Application service エンドポイント（homeserver → bridge）
        .route("/_matrix/app/v1/transactions/{txn_id}", put(push_transaction))
        .route("/transactions/{txn_id}", put(push_transaction))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bridge HTTP / WebSocket server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state);
/// server.run("127.0.0.1".to_string(), 1237).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    /// Create a new Server instance
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Run the server until the shutdown flag in the state is raised
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 1237)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let shutdown = self.state.shutdown.clone();
        let app = router(self.state);

        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        // Start the server
        tracing::info!("Bridge listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/{{room_id}}", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
