//! JSON Relay Encoder 実装

use crate::{
    domain::{ChatMessage, RelayEncoder, RelayError},
    infrastructure::dto::websocket::RelayPayload,
};

/// `RelayPayload` の JSON テキストとしてエンコードする
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRelayEncoder;

impl RelayEncoder for JsonRelayEncoder {
    fn encode(&self, message: &ChatMessage) -> Result<String, RelayError> {
        serde_json::to_string(&RelayPayload::from(message))
            .map_err(|e| RelayError::Encode(e.to_string()))
    }
}
