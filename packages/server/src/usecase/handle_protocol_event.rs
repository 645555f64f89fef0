//! UseCase: プロトコルイベントの受信（Event Ingress）
//!
//! ## 概要
//!
//! homeserver から届いたイベントを分類し、Room Store の更新か、
//! Relay キューへのメッセージ投入のどちらかを行います。
//!
//! | イベント | 処理 |
//! |---|---|
//! | `m.room.create` | 名前が空の `RoomRecord` を保存 |
//! | `m.room.name` | 既存の `RoomRecord` を取得し、名前を変更して保存 |
//! | `m.room.message` | `ChatMessage` を Relay キューに投入 |
//! | その他 | ログのみ |
//!
//! ## エラー処理
//!
//! 失敗はすべてログに残して `IngressOutcome::Dropped` を返します。
//! 呼び出し元（プロトコル層）にエラーを伝播させないため、後続イベントの配送は止まりません。
//!
//! `m.room.create` と直後の `m.room.message` の処理順序は保証されません。
//! メッセージの中継は Room Store を参照しないため、どちらの順序でも配送されます。

use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::domain::{
    ChatMessage, EventKind, ProtocolEvent, RelayError, RoomName, RoomRecord, RoomRepository,
    Timestamp,
};

use super::relay_broadcast::RelayQueue;

/// イベント処理の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    /// Room を作成した
    RoomCreated(RoomRecord),
    /// Room の名前を変更した
    RoomRenamed(RoomRecord),
    /// メッセージを Relay キューに投入した
    Enqueued,
    /// 失敗したため破棄した（理由はログに出力済み）
    Dropped,
    /// 処理対象外の種別
    Ignored,
}

/// Event Ingress のユースケース
pub struct HandleProtocolEventUseCase {
    repository: Arc<dyn RoomRepository>,
    relay_queue: RelayQueue,
    clock: Arc<dyn Clock>,
}

impl HandleProtocolEventUseCase {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        relay_queue: RelayQueue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            relay_queue,
            clock,
        }
    }

    /// イベントを 1 件処理
    pub async fn execute(&self, event: ProtocolEvent) -> IngressOutcome {
        tracing::info!(
            "Received room event, ID: {}, of type: {}",
            event.room_id(),
            event.kind().as_event_type()
        );

        match event.kind() {
            EventKind::RoomCreated => self.create_room(&event).await,
            EventKind::RoomNameChanged => self.rename_room(&event).await,
            EventKind::Message => self.relay_message(event).await,
            _ => {
                tracing::debug!(
                    "No action for event type '{}' in room '{}'",
                    event.kind().as_event_type(),
                    event.room_id()
                );
                IngressOutcome::Ignored
            }
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    async fn create_room(&self, event: &ProtocolEvent) -> IngressOutcome {
        let record = RoomRecord::new(event.room_id().clone(), self.now());
        match self.repository.store(record).await {
            Ok(stored) => {
                tracing::info!("Room '{}' stored", stored.id);
                IngressOutcome::RoomCreated(stored)
            }
            Err(e) => {
                tracing::error!("Error storing room '{}': {}", event.room_id(), e);
                IngressOutcome::Dropped
            }
        }
    }

    async fn rename_room(&self, event: &ProtocolEvent) -> IngressOutcome {
        let Some(name) = event.room_name() else {
            tracing::warn!("Room name event for '{}' has no name", event.room_id());
            return IngressOutcome::Dropped;
        };

        let mut record = match self.repository.fetch(event.room_id()).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                // 作成イベントがまだ処理されていない可能性がある
                tracing::warn!(
                    "Room '{}' not found, dropping name change to '{}'",
                    event.room_id(),
                    name
                );
                return IngressOutcome::Dropped;
            }
            Err(e) => {
                tracing::error!("Error fetching room '{}': {}", event.room_id(), e);
                return IngressOutcome::Dropped;
            }
        };

        record.rename(RoomName::new(name.to_string()), self.now());
        match self.repository.store(record).await {
            Ok(stored) => {
                tracing::info!("Room '{}' renamed to '{}'", stored.id, stored.name.as_str());
                IngressOutcome::RoomRenamed(stored)
            }
            Err(e) => {
                tracing::error!("Error storing room '{}': {}", event.room_id(), e);
                IngressOutcome::Dropped
            }
        }
    }

    async fn relay_message(&self, event: ProtocolEvent) -> IngressOutcome {
        let Some(body) = event.message_body() else {
            tracing::warn!("Message event for '{}' has no body", event.room_id());
            return IngressOutcome::Dropped;
        };
        tracing::info!("{}: {}", event.sender(), body);

        let message = ChatMessage::new(
            body.to_string(),
            event.sender().clone(),
            event.room_id().clone(),
        );
        match self.relay_queue.enqueue(message).await {
            Ok(()) => IngressOutcome::Enqueued,
            Err(RelayError::QueueFull) => {
                tracing::warn!(
                    "Relay queue full, dropping message for room '{}'",
                    event.room_id()
                );
                IngressOutcome::Dropped
            }
            Err(e) => {
                tracing::error!(
                    "Failed to enqueue message for room '{}': {}",
                    event.room_id(),
                    e
                );
                IngressOutcome::Dropped
            }
        }
    }
}
