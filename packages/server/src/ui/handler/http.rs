//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{RoomConnectionsDto, RoomDto, RoomsQuery},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// List rooms, optionally filtered by a name substring (`?name=...`)
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<RoomDto>>, (StatusCode, &'static str)> {
    match state.get_rooms_usecase.execute(query.name.as_deref()).await {
        Ok(rooms) => Ok(Json(rooms.into_iter().map(RoomDto::from).collect())),
        Err(e) => {
            tracing::error!("Failed to fetch rooms: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch rooms"))
        }
    }
}

/// Debug endpoint listing the number of live connections per room
pub async fn debug_connections(State(state): State<Arc<AppState>>) -> Json<Vec<RoomConnectionsDto>> {
    let snapshot = state.registry.snapshot().await;
    Json(snapshot.into_iter().map(RoomConnectionsDto::from).collect())
}
