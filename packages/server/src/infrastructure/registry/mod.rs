//! Connection Registry の実装
//!
//! - `websocket`: WebSocket 接続の送信チャネルをプロセス内で管理する実装

pub mod websocket;

pub use websocket::WebSocketConnectionRegistry;
