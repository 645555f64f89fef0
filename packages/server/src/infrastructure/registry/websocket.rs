//! WebSocket を使った Connection Registry 実装
//!
//! ## 責務
//!
//! - Room ごとに接続ハンドル（送信チャネル）を登録順に保持
//! - Room 内の全接続へのペイロード送信（fan-out）
//!
//! fan-out は接続ごとの有界な送信キューに待機せずに積みます。キューが満杯の
//! 接続（読み取りの遅いクライアント）はそのメッセージを受け取れず、失敗として報告されます。
//!
//! ## ロックの構成
//!
//! ```text
//! rooms: RwLock<HashMap<RoomId, Arc<Mutex<Vec<ConnectionHandle>>>>>
//! ```
//!
//! 外側の `RwLock` は Room エントリの追加時のみ書き込みロックを取ります。
//! 接続リストの変更と fan-out は Room ごとの `Mutex` で直列化されるため、
//! 別の Room への操作は並行に進みます。
//!
//! エントリは空になっても削除しません（空の接続リストも正常な状態）。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc::error::TrySendError};

use crate::domain::{
    ConnectionHandle, ConnectionRegistry, FanOutOutcome, RoomConnections, RoomId,
};

type RoomConnectionList = Arc<Mutex<Vec<ConnectionHandle>>>;

/// WebSocket を使った Connection Registry 実装
#[derive(Default)]
pub struct WebSocketConnectionRegistry {
    /// Key: Room ID, Value: 登録順の接続ハンドル
    rooms: RwLock<HashMap<RoomId, RoomConnectionList>>,
}

impl WebSocketConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn room_entry(&self, room_id: &RoomId) -> Option<RoomConnectionList> {
        self.rooms.read().await.get(room_id).cloned()
    }

    async fn room_entry_or_insert(&self, room_id: &RoomId) -> RoomConnectionList {
        if let Some(entry) = self.room_entry(room_id).await {
            return entry;
        }
        let mut rooms = self.rooms.write().await;
        rooms.entry(room_id.clone()).or_default().clone()
    }
}

#[async_trait]
impl ConnectionRegistry for WebSocketConnectionRegistry {
    async fn register(&self, room_id: &RoomId, handle: ConnectionHandle) {
        let entry = self.room_entry_or_insert(room_id).await;
        let mut connections = entry.lock().await;
        if connections.contains(&handle) {
            tracing::debug!(
                "Connection '{}' already registered for room '{}'",
                handle.id(),
                room_id
            );
            return;
        }
        tracing::debug!(
            "Connection '{}' registered to room '{}' ({} connection(s))",
            handle.id(),
            room_id,
            connections.len() + 1
        );
        connections.push(handle);
    }

    async fn deregister(&self, room_id: &RoomId, handle: &ConnectionHandle) -> bool {
        let Some(entry) = self.room_entry(room_id).await else {
            return false;
        };
        let mut connections = entry.lock().await;
        match connections.iter().position(|c| c == handle) {
            Some(index) => {
                connections.remove(index);
                tracing::debug!(
                    "Connection '{}' deregistered from room '{}' ({} connection(s) left)",
                    handle.id(),
                    room_id,
                    connections.len()
                );
                true
            }
            None => false,
        }
    }

    async fn fan_out(&self, room_id: &RoomId, payload: &str) -> FanOutOutcome {
        let Some(entry) = self.room_entry(room_id).await else {
            return FanOutOutcome::NoSubscribers;
        };
        let connections = entry.lock().await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for connection in connections.iter() {
            // 一部の送信失敗を許容し、残りの接続への送信を続ける
            match connection.push(payload) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Outbound queue full, dropping message for connection '{}' in room '{}'",
                        connection.id(),
                        room_id
                    );
                    failed.push(connection.id());
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!(
                        "Failed to write message to connection '{}' in room '{}': connection closed",
                        connection.id(),
                        room_id
                    );
                    failed.push(connection.id());
                }
            }
        }

        FanOutOutcome::Delivered { delivered, failed }
    }

    async fn connection_count(&self, room_id: &RoomId) -> Option<usize> {
        let entry = self.room_entry(room_id).await?;
        let connections = entry.lock().await;
        Some(connections.len())
    }

    async fn snapshot(&self) -> Vec<RoomConnections> {
        let entries: Vec<(RoomId, RoomConnectionList)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(room_id, entry)| (room_id.clone(), entry.clone()))
            .collect();

        let mut snapshot = Vec::with_capacity(entries.len());
        for (room_id, entry) in entries {
            let connections = entry.lock().await.len();
            snapshot.push(RoomConnections {
                room_id,
                connections,
            });
        }
        snapshot.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        snapshot
    }
}
