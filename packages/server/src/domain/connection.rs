//! WebSocket 接続のハンドルとライフサイクル

use tokio::sync::mpsc;

use super::value_object::ConnectionId;

/// 接続へ送信するメッセージのチャネル
///
/// 受信側は接続ごとの pusher タスクが保持し、WebSocket に書き込みます。
/// 有界なので、読み取りの遅いクライアントの分だけメモリが増え続けることはありません。
pub type PusherChannel = mpsc::Sender<String>;

/// 1 つの WebSocket 接続を表すハンドル
///
/// Registry のエントリと、その接続を担当する読み取りループとで共有されます。
/// 等価性は `ConnectionId` のみで判定します。
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: PusherChannel,
}

impl ConnectionHandle {
    pub fn new(sender: PusherChannel) -> Self {
        Self {
            id: ConnectionId::generate(),
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// ペイロードを接続の送信キューに積む（待機しない）
    ///
    /// 送信キューが満杯の場合と、pusher タスクが終了している（ソケットが閉じている）
    /// 場合は `Err` を返します。
    pub fn push(&self, payload: &str) -> Result<(), mpsc::error::TrySendError<String>> {
        self.sender.try_send(payload.to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

/// 接続のライフサイクル
///
/// `Open` → `Closing` → `Closed` の一方向にのみ遷移します。再接続はありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registry に登録され、クライアントからの読み取り中
    Open,
    /// 読み取りが終了し、登録解除とリソース解放を行っている
    Closing,
    /// 終端状態
    Closed,
}

impl ConnectionState {
    /// 次の状態へ遷移する。`Closed` からは遷移しない。
    pub fn advance(self) -> Self {
        match self {
            Self::Open => Self::Closing,
            Self::Closing | Self::Closed => Self::Closed,
        }
    }
}
