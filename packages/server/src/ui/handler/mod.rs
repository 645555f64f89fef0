//! Request handlers.

pub mod appservice;
pub mod http;
pub mod websocket;
