//! Matrix ⇄ WebSocket bridge library.
//!
//! Protocol events pushed by the homeserver are relayed to per-room WebSocket
//! subscribers, and text sent by those subscribers is relayed back into the
//! room as outgoing messages.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
