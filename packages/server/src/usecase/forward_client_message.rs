//! UseCase: クライアントから受け取ったテキストを Room へ送信
//!
//! 失敗は呼び出し元（読み取りループ）がログに残し、ループは継続します。
//! 自動リトライは行いません。

use std::sync::Arc;

use crate::domain::{ProtocolClient, RoomId};

use super::error::ForwardClientMessageError;

/// クライアントメッセージ転送のユースケース
pub struct ForwardClientMessageUseCase {
    protocol_client: Arc<dyn ProtocolClient>,
}

impl ForwardClientMessageUseCase {
    pub fn new(protocol_client: Arc<dyn ProtocolClient>) -> Self {
        Self { protocol_client }
    }

    /// テキストをそのままメッセージ本文として Room に送信
    pub async fn execute(&self, room_id: &RoomId, body: &str) -> Result<(), ForwardClientMessageError> {
        self.protocol_client.send_message(room_id, body).await?;
        tracing::debug!("Forwarded client message to room '{}'", room_id);
        Ok(())
    }
}
