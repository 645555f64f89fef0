//! Domain layer.
//!
//! 値オブジェクト、エンティティ、外部との境界となる trait を定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

pub mod connection;
pub mod connection_registry;
pub mod entity;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod repository;
pub mod value_object;

pub use connection::{ConnectionHandle, ConnectionState, PusherChannel};
pub use connection_registry::{ConnectionRegistry, FanOutOutcome, RoomConnections};
pub use entity::{ChatMessage, RoomRecord};
pub use error::{ProtocolError, RelayError, RepositoryError, ValueObjectError};
pub use protocol::{EventContent, EventKind, ProtocolClient, ProtocolEvent};
pub use relay::RelayEncoder;
pub use repository::RoomRepository;
pub use value_object::{ConnectionId, RoomId, RoomName, Timestamp, UserId};
