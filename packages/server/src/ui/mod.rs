//! HTTP / WebSocket surface of the bridge.

mod handler;
mod server;
pub mod signal;
pub mod state;

pub use server::{Server, router};
