//! Conversion logic between DTOs and domain entities.

use thiserror::Error;

use kakehashi_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    ChatMessage, EventContent, EventKind, ProtocolEvent, RoomConnections, RoomId, RoomRecord,
    UserId, ValueObjectError,
};
use crate::infrastructure::dto::{appservice, http, websocket};

/// Failure to turn an appservice event into a domain event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventConversionError {
    #[error("event is missing '{0}'")]
    MissingField(&'static str),

    #[error("invalid event field: {0}")]
    InvalidField(#[from] ValueObjectError),
}

// ========================================
// DTO → Domain
// ========================================

impl TryFrom<appservice::EventDto> for ProtocolEvent {
    type Error = EventConversionError;

    fn try_from(dto: appservice::EventDto) -> Result<Self, Self::Error> {
        let event_type = dto
            .event_type
            .ok_or(EventConversionError::MissingField("type"))?;
        let room_id = RoomId::new(
            dto.room_id
                .ok_or(EventConversionError::MissingField("room_id"))?,
        )?;
        let sender = UserId::new(dto.sender.ok_or(EventConversionError::MissingField("sender"))?)?;

        let kind = EventKind::from_event_type(&event_type);
        let content = match kind {
            EventKind::Message => match dto.content.get("body").and_then(|v| v.as_str()) {
                Some(body) => EventContent::Message {
                    body: body.to_string(),
                },
                None => EventContent::None,
            },
            // 名前の削除は name なし（または空文字列）で届く
            EventKind::RoomNameChanged => EventContent::RoomName {
                name: dto
                    .content
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => EventContent::None,
        };

        Ok(ProtocolEvent::new(kind, room_id, sender, content))
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<&ChatMessage> for websocket::RelayPayload {
    fn from(message: &ChatMessage) -> Self {
        Self {
            body: message.body().to_string(),
            user: message.sender().as_str().to_string(),
            room_id: message.room().as_str().to_string(),
        }
    }
}

impl From<RoomRecord> for http::RoomDto {
    fn from(record: RoomRecord) -> Self {
        Self {
            id: record.id.into_string(),
            name: record.name.into_string(),
            created_at: timestamp_to_rfc3339(record.created_at.value()),
            updated_at: timestamp_to_rfc3339(record.updated_at.value()),
        }
    }
}

impl From<RoomConnections> for http::RoomConnectionsDto {
    fn from(model: RoomConnections) -> Self {
        Self {
            room_id: model.room_id.into_string(),
            connections: model.connections,
        }
    }
}
