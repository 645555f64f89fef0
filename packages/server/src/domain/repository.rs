//! Repository trait 定義
//!
//! ドメイン層が必要とする Room Store へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{entity::RoomRecord, error::RepositoryError, value_object::RoomId};

/// Room Repository trait
///
/// 各操作はそれ自体でアトミックであり、操作をまたぐトランザクションは持ちません。
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Room を保存（upsert）し、保存後の状態を返す
    ///
    /// 既存の Room がある場合は `name` と `updated_at` のみ更新し、
    /// `created_at` は最初に保存されたものを保持します。
    async fn store(&self, room: RoomRecord) -> Result<RoomRecord, RepositoryError>;

    /// Room を取得（存在しなければ `Ok(None)`）
    async fn fetch(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, RepositoryError>;

    /// 全 Room を作成日時の新しい順に取得
    async fn list(&self) -> Result<Vec<RoomRecord>, RepositoryError>;

    /// 名前に `term` を含む Room を作成日時の新しい順に取得
    async fn search_by_name(&self, term: &str) -> Result<Vec<RoomRecord>, RepositoryError>;
}
