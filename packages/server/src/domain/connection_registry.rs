//! Connection Registry trait 定義
//!
//! Room ごとに接続中の WebSocket ハンドルを管理するインターフェース。
//! 具体的な実装は Infrastructure 層が提供します。

use async_trait::async_trait;

use super::{
    connection::ConnectionHandle,
    value_object::{ConnectionId, RoomId},
};

/// fan-out の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanOutOutcome {
    /// Room のエントリが存在しない（一度も接続がない）
    NoSubscribers,
    /// 登録済みの全接続に送信を試みた
    Delivered {
        /// 送信に成功した接続数
        delivered: usize,
        /// 送信に失敗した接続（登録解除は読み取りループが行う）
        failed: Vec<ConnectionId>,
    },
}

impl FanOutOutcome {
    pub fn delivered(&self) -> usize {
        match self {
            Self::NoSubscribers => 0,
            Self::Delivered { delivered, .. } => *delivered,
        }
    }
}

/// Room ごとの接続数（デバッグ用スナップショット）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConnections {
    pub room_id: RoomId,
    pub connections: usize,
}

/// Connection Registry trait
///
/// ## 並行性
///
/// - 同じ Room に対する登録・解除・fan-out は互いに排他
/// - 異なる Room に対する操作は並行に実行できる
/// - fan-out は Registry を変更しない（失敗した接続の解除は接続の持ち主が行う）
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Room に接続を登録（既に登録済みなら何もしない）
    async fn register(&self, room_id: &RoomId, handle: ConnectionHandle);

    /// Room から接続を登録解除（最初に見つかった 1 件のみ）
    ///
    /// 登録されていない場合は何もせず `false` を返します。
    async fn deregister(&self, room_id: &RoomId, handle: &ConnectionHandle) -> bool;

    /// Room に登録された全接続へ、登録順にペイロードを送信
    async fn fan_out(&self, room_id: &RoomId, payload: &str) -> FanOutOutcome;

    /// Room に登録されている接続数（エントリがなければ `None`）
    async fn connection_count(&self, room_id: &RoomId) -> Option<usize>;

    /// 全 Room の接続数
    async fn snapshot(&self) -> Vec<RoomConnections>;
}
