//! Application service transaction DTOs.
//!
//! The homeserver pushes batches of events as
//! `PUT /_matrix/app/v1/transactions/{txn_id}` with a body of `{"events": [...]}`.

use serde::Deserialize;

/// Transaction body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionDto {
    #[serde(default)]
    pub events: Vec<EventDto>,
}

/// A single client-server API event.
///
/// Only the fields the bridge needs are decoded; missing identity fields are
/// kept as `None` so one malformed event does not reject the whole transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventDto {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub room_id: Option<String>,
    pub sender: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// `access_token` query parameter (legacy homeserver authentication)
#[derive(Debug, Default, Deserialize)]
pub struct AccessTokenQuery {
    pub access_token: Option<String>,
}
