//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RepositoryError, RoomId, RoomRecord, RoomRepository};

/// インメモリ Room Repository 実装
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<RoomId, RoomRecord>>,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut rooms: Vec<RoomRecord>) -> Vec<RoomRecord> {
    rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rooms
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn store(&self, room: RoomRecord) -> Result<RoomRecord, RepositoryError> {
        let mut rooms = self.rooms.lock().await;
        let stored = match rooms.get(&room.id) {
            Some(existing) => RoomRecord {
                created_at: existing.created_at,
                ..room
            },
            None => room,
        };
        rooms.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn fetch(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(rooms.get(room_id).cloned())
    }

    async fn list(&self) -> Result<Vec<RoomRecord>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(newest_first(rooms.values().cloned().collect()))
    }

    async fn search_by_name(&self, term: &str) -> Result<Vec<RoomRecord>, RepositoryError> {
        let rooms = self.rooms.lock().await;
        Ok(newest_first(
            rooms
                .values()
                .filter(|room| room.name.as_str().contains(term))
                .cloned()
                .collect(),
        ))
    }
}
