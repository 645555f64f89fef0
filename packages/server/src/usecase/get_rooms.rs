//! UseCase: Room 一覧の取得

use std::sync::Arc;

use crate::domain::{RoomRecord, RoomRepository};

use super::error::GetRoomsError;

/// Room 一覧取得のユースケース
pub struct GetRoomsUseCase {
    repository: Arc<dyn RoomRepository>,
}

impl GetRoomsUseCase {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// Room 一覧を取得
    ///
    /// `name_filter` が指定された場合は名前の部分一致で検索します。
    pub async fn execute(&self, name_filter: Option<&str>) -> Result<Vec<RoomRecord>, GetRoomsError> {
        let rooms = match name_filter {
            Some(term) => self.repository.search_by_name(term).await?,
            None => self.repository.list().await?,
        };
        Ok(rooms)
    }
}
