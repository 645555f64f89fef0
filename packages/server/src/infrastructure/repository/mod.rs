//! Room Repository の実装
//!
//! - `sqlite`: rusqlite を使った永続化実装（本番用）
//! - `inmemory`: HashMap を使ったインメモリ実装（テスト用）

pub mod inmemory;
pub mod sqlite;

pub use inmemory::InMemoryRoomRepository;
pub use sqlite::SqliteRoomRepository;
