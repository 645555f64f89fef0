//! WebSocket payload DTOs.

use serde::{Deserialize, Serialize};

/// Chat message relayed to WebSocket clients.
///
/// Wire shape: `{"body": "...", "user": "@u:server", "room_id": "!abc"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub body: String,
    pub user: String,
    pub room_id: String,
}
