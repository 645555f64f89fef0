//! UseCase: WebSocket クライアントの接続

use std::sync::Arc;

use crate::domain::{ConnectionHandle, ConnectionRegistry, RoomId};

/// クライアント接続のユースケース
pub struct ConnectClientUseCase {
    registry: Arc<dyn ConnectionRegistry>,
}

impl ConnectClientUseCase {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// 接続を Room に登録する。登録は常に成功する。
    pub async fn execute(&self, room_id: &RoomId, handle: ConnectionHandle) {
        let connection_id = handle.id();
        self.registry.register(room_id, handle).await;
        tracing::info!(
            "Connection '{}' for room '{}' registered",
            connection_id,
            room_id
        );
    }
}
