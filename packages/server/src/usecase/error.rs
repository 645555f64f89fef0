//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{ProtocolError, RepositoryError};

/// Room 一覧取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomsError {
    #[error("failed to read rooms: {0}")]
    Repository(#[from] RepositoryError),
}

/// クライアントから受け取ったメッセージの転送エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardClientMessageError {
    #[error("failed to send message to homeserver: {0}")]
    Protocol(#[from] ProtocolError),
}
