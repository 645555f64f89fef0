//! Matrix application service として homeserver にメッセージを送信する ProtocolClient 実装
//!
//! 送信は `PUT /_matrix/client/v3/rooms/{roomId}/send/m.room.message/{txnId}` を使います。
//! 認証は `as_token` の Bearer トークン、送信者は `user_id` クエリで指定します。

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{ProtocolClient, ProtocolError, RoomId};

/// `m.room.message` の本文
#[derive(Debug, Serialize)]
struct TextMessageContent<'a> {
    msgtype: &'static str,
    body: &'a str,
}

/// Matrix application service クライアント
pub struct MatrixClient {
    http: reqwest::Client,
    homeserver_url: Url,
    as_token: String,
    user_id: String,
}

impl MatrixClient {
    pub fn new(homeserver_url: Url, as_token: String, user_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            homeserver_url,
            as_token,
            user_id,
        }
    }

    /// 送信先 URL を組み立てる（Room ID はパスセグメントとしてエスケープされる）
    fn send_url(&self, room_id: &RoomId, txn_id: &str) -> Result<Url, ProtocolError> {
        let mut url = self.homeserver_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProtocolError::Transport(format!(
                    "homeserver URL cannot be a base: {}",
                    self.homeserver_url
                ))
            })?
            .pop_if_empty()
            .extend([
                "_matrix",
                "client",
                "v3",
                "rooms",
                room_id.as_str(),
                "send",
                "m.room.message",
                txn_id,
            ]);
        url.query_pairs_mut().append_pair("user_id", &self.user_id);
        Ok(url)
    }
}

#[async_trait]
impl ProtocolClient for MatrixClient {
    async fn send_message(&self, room_id: &RoomId, body: &str) -> Result<(), ProtocolError> {
        let txn_id = Uuid::new_v4().to_string();
        let url = self.send_url(room_id, &txn_id)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.as_token)
            .json(&TextMessageContent {
                msgtype: "m.text",
                body,
            })
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProtocolError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Sent message to room '{}' (txn {})", room_id, txn_id);
        Ok(())
    }
}
