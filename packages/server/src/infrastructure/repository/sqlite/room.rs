//! SQLite Room Repository 実装
//!
//! rusqlite の `Connection` は `Sync` ではないため `parking_lot::Mutex` で保護します。
//! rusqlite の呼び出しはブロッキングなので、各操作は `spawn_blocking` で
//! 専用スレッドに移し、非同期ワーカー（Event Ingress や WebSocket のタスク）を止めません。

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{RepositoryError, RoomId, RoomName, RoomRecord, RoomRepository, Timestamp};

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);";

const UPSERT_ROOM: &str = "
INSERT INTO rooms (id, name, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    updated_at = excluded.updated_at";

const SELECT_ROOM: &str = "
SELECT id, name, created_at, updated_at
FROM rooms
WHERE id = ?1";

const SELECT_ROOMS: &str = "
SELECT id, name, created_at, updated_at
FROM rooms
ORDER BY created_at DESC";

const SEARCH_ROOMS: &str = "
SELECT id, name, created_at, updated_at
FROM rooms
WHERE name LIKE '%' || ?1 || '%'
ORDER BY created_at DESC";

/// SQLite Room Repository 実装
pub struct SqliteRoomRepository {
    conn: Arc<Mutex<Connection>>,
}

/// DB から読み出したままの行
type RawRoomRow = (String, String, i64, i64);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRoomRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_record((id, name, created_at, updated_at): RawRoomRow) -> Result<RoomRecord, RepositoryError> {
    let id = RoomId::new(id).map_err(|e| RepositoryError::Corrupted(e.to_string()))?;
    Ok(RoomRecord {
        id,
        name: RoomName::new(name),
        created_at: Timestamp::new(created_at),
        updated_at: Timestamp::new(updated_at),
    })
}

fn database_error(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn query_rooms(
    conn: &Connection,
    sql: &str,
    term: Option<&str>,
) -> Result<Vec<RoomRecord>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(database_error)?;
    let rows = match term {
        Some(term) => stmt.query_map(params![term], read_row),
        None => stmt.query_map([], read_row),
    }
    .map_err(database_error)?;

    rows.map(|row| into_record(row.map_err(database_error)?))
        .collect()
}

impl SqliteRoomRepository {
    /// データベースを開き（なければ作成し）、スキーマを初期化する
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(database_error)?;
        let repository = Self::with_connection(conn)?;
        tracing::info!("Room database opened at {}", path.display());
        Ok(repository)
    }

    /// インメモリのデータベースを開く（テスト用）
    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory().map_err(database_error)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| RepositoryError::Database(format!("schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// ロックを取得した接続で `f` をブロッキング用スレッド上で実行する
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| RepositoryError::Database(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl RoomRepository for SqliteRoomRepository {
    async fn store(&self, room: RoomRecord) -> Result<RoomRecord, RepositoryError> {
        self.with_conn(move |conn| {
            conn.execute(
                UPSERT_ROOM,
                params![
                    room.id.as_str(),
                    room.name.as_str(),
                    room.created_at.value(),
                    room.updated_at.value()
                ],
            )
            .map_err(database_error)?;

            let row = conn
                .query_row(SELECT_ROOM, params![room.id.as_str()], read_row)
                .map_err(database_error)?;
            into_record(row)
        })
        .await
    }

    async fn fetch(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, RepositoryError> {
        let room_id = room_id.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(SELECT_ROOM, params![room_id.as_str()], read_row)
                .optional()
                .map_err(database_error)?;
            row.map(into_record).transpose()
        })
        .await
    }

    async fn list(&self) -> Result<Vec<RoomRecord>, RepositoryError> {
        self.with_conn(|conn| query_rooms(conn, SELECT_ROOMS, None))
            .await
    }

    async fn search_by_name(&self, term: &str) -> Result<Vec<RoomRecord>, RepositoryError> {
        let term = term.to_string();
        self.with_conn(move |conn| query_rooms(conn, SEARCH_ROOMS, Some(&term)))
            .await
    }
}
