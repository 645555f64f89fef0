//! ドメイン層のエラー型

use thiserror::Error;

/// 値オブジェクト生成時の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("room id must not be empty")]
    RoomIdEmpty,

    #[error("room id must not contain whitespace: '{0}'")]
    RoomIdContainsWhitespace(String),

    #[error("user id must not be empty")]
    UserIdEmpty,
}

/// Room Store のエラー
///
/// 「存在しない」はエラーではなく `Ok(None)` で表現します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupted room row: {0}")]
    Corrupted(String),
}

/// プロトコル層（homeserver）への送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("homeserver rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Relay キューへの投入エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay queue is full, message dropped")]
    QueueFull,

    #[error("relay queue is closed")]
    QueueClosed,

    #[error("failed to encode relay payload: {0}")]
    Encode(String),
}
