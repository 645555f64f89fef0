//! プロトコル（Matrix）との境界
//!
//! homeserver から届くイベントのモデルと、homeserver へ送信する
//! クライアントの trait を定義します。

use async_trait::async_trait;

use super::{
    error::ProtocolError,
    value_object::{RoomId, UserId},
};

/// イベントの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `m.room.message`
    Message,
    /// `m.reaction`
    Reaction,
    /// `m.room.encrypted`
    Encrypted,
    /// `m.room.member`
    Member,
    /// `m.room.create`
    RoomCreated,
    /// `m.room.aliases`
    Aliases,
    /// `m.room.canonical_alias`
    CanonicalAlias,
    /// `m.room.name`
    RoomNameChanged,
    /// 上記以外
    Other(String),
}

impl EventKind {
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "m.room.message" => Self::Message,
            "m.reaction" => Self::Reaction,
            "m.room.encrypted" => Self::Encrypted,
            "m.room.member" => Self::Member,
            "m.room.create" => Self::RoomCreated,
            "m.room.aliases" => Self::Aliases,
            "m.room.canonical_alias" => Self::CanonicalAlias,
            "m.room.name" => Self::RoomNameChanged,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_event_type(&self) -> &str {
        match self {
            Self::Message => "m.room.message",
            Self::Reaction => "m.reaction",
            Self::Encrypted => "m.room.encrypted",
            Self::Member => "m.room.member",
            Self::RoomCreated => "m.room.create",
            Self::Aliases => "m.room.aliases",
            Self::CanonicalAlias => "m.room.canonical_alias",
            Self::RoomNameChanged => "m.room.name",
            Self::Other(event_type) => event_type,
        }
    }
}

/// イベントの種類ごとの内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventContent {
    Message { body: String },
    RoomName { name: String },
    None,
}

/// homeserver から届いたイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolEvent {
    kind: EventKind,
    room_id: RoomId,
    sender: UserId,
    content: EventContent,
}

impl ProtocolEvent {
    pub fn new(kind: EventKind, room_id: RoomId, sender: UserId, content: EventContent) -> Self {
        Self {
            kind,
            room_id,
            sender,
            content,
        }
    }

    pub fn message(room_id: RoomId, sender: UserId, body: impl Into<String>) -> Self {
        Self::new(
            EventKind::Message,
            room_id,
            sender,
            EventContent::Message { body: body.into() },
        )
    }

    pub fn room_created(room_id: RoomId, sender: UserId) -> Self {
        Self::new(EventKind::RoomCreated, room_id, sender, EventContent::None)
    }

    pub fn room_name_changed(room_id: RoomId, sender: UserId, name: impl Into<String>) -> Self {
        Self::new(
            EventKind::RoomNameChanged,
            room_id,
            sender,
            EventContent::RoomName { name: name.into() },
        )
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn sender(&self) -> &UserId {
        &self.sender
    }

    /// メッセージ本文（`m.room.message` 以外は `None`）
    pub fn message_body(&self) -> Option<&str> {
        match &self.content {
            EventContent::Message { body } => Some(body),
            _ => None,
        }
    }

    /// 新しい Room 名（`m.room.name` 以外は `None`）
    pub fn room_name(&self) -> Option<&str> {
        match &self.content {
            EventContent::RoomName { name } => Some(name),
            _ => None,
        }
    }
}

/// homeserver へメッセージを送信するクライアント
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Room にテキストメッセージを送信
    async fn send_message(&self, room_id: &RoomId, body: &str) -> Result<(), ProtocolError>;
}
