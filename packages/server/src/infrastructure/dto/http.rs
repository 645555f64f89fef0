//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Room entry returned by `GET /api/rooms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    /// RFC 3339 (UTC)
    pub created_at: String,
    /// RFC 3339 (UTC)
    pub updated_at: String,
}

/// Query parameters for `GET /api/rooms`
#[derive(Debug, Default, Deserialize)]
pub struct RoomsQuery {
    /// Substring filter on the room name
    pub name: Option<String>,
}

/// Entry returned by `GET /debug/connections`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConnectionsDto {
    pub room_id: String,
    pub connections: usize,
}
