//! Relay ペイロードの trait 定義
//!
//! Broadcaster がクライアントへ送る文字列の形式はここでは決めず、
//! Infrastructure 層の実装に任せます。

use super::{entity::ChatMessage, error::RelayError};

/// `ChatMessage` をクライアント向けのペイロードに変換する
pub trait RelayEncoder: Send + Sync {
    fn encode(&self, message: &ChatMessage) -> Result<String, RelayError>;
}
