//! エンティティ

use super::value_object::{RoomId, RoomName, Timestamp, UserId};

/// Room に投稿されたチャットメッセージ
///
/// Event Ingress が生成し、Relay Broadcaster がちょうど一度だけ消費します。
/// 生成後は変更しないため、フィールドは読み取り専用のアクセサで公開します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    body: String,
    sender: UserId,
    room: RoomId,
}

impl ChatMessage {
    pub fn new(body: String, sender: UserId, room: RoomId) -> Self {
        Self { body, sender, room }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn sender(&self) -> &UserId {
        &self.sender
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }
}

/// Room Store が保持する Room の記録
///
/// 同一性は `id` で判定します。`created_at` は最初の保存時に決まり、
/// 以降の保存（upsert）では `name` と `updated_at` のみが更新されます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: RoomName,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RoomRecord {
    /// 名前を持たない Room を作成（room-created イベント相当）
    pub fn new(id: RoomId, now: Timestamp) -> Self {
        Self {
            id,
            name: RoomName::empty(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 表示名を変更し、`updated_at` を進める
    pub fn rename(&mut self, name: RoomName, now: Timestamp) {
        self.name = name;
        self.updated_at = now;
    }
}
