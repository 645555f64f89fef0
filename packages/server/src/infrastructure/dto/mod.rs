//! Data Transfer Objects (DTOs) for the bridge.
//!
//! DTOs are organized by protocol:
//! - `websocket`: payloads pushed to WebSocket clients
//! - `http`: HTTP API response DTOs
//! - `appservice`: transactions pushed by the homeserver

pub mod appservice;
pub mod conversion;
pub mod http;
pub mod websocket;
