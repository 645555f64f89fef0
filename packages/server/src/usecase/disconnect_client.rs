//! UseCase: WebSocket クライアントの切断
//!
//! 登録解除は、その接続の読み取りループからのみ呼び出します。
//! fan-out 側で失敗を検出しても Registry は変更しません。

use std::sync::Arc;

use crate::domain::{ConnectionHandle, ConnectionRegistry, RoomId};

/// クライアント切断のユースケース
pub struct DisconnectClientUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl DisconnectClientUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続を Room から登録解除する
    ///
    /// 複数の終了経路から呼ばれても安全です（未登録なら何もしない）。
    ///
    /// # Returns
    ///
    /// 実際に登録解除された場合は `true`
    pub async fn execute(&self, room_id: &RoomId, handle: &ConnectionHandle) -> bool {
        let removed = self.registry.deregister(room_id, handle).await;
        if removed {
            tracing::info!(
                "Connection '{}' for room '{}' deregistered",
                handle.id(),
                room_id
            );
        } else {
            tracing::debug!(
                "Connection '{}' for room '{}' was already deregistered",
                handle.id(),
                room_id
            );
        }
        removed
    }
}
