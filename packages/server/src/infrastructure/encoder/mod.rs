//! Relay Encoder の実装
//!
//! - `json`: `{"body", "user", "room_id"}` の JSON テキスト

pub mod json;

pub use json::JsonRelayEncoder;
