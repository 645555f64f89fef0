//! Relay キューと Relay Broadcaster
//!
//! ## 概要
//!
//! Event Ingress が生成した `ChatMessage` を有界キューに積み、単一の
//! Broadcaster が取り出して Room の全接続へ fan-out します。
//!
//! ## バックプレッシャー
//!
//! キューが満杯の場合、投入側は `enqueue_timeout` まで待機します（プロトコル側の
//! イベント配送にバックプレッシャーがかかる）。それを超えた場合はメッセージを破棄し、
//! 呼び出し元に `RelayError::QueueFull` を返します。
//!
//! ## 順序保証
//!
//! 消費者は 1 つだけなので、同じ Room へのメッセージは投入順に配送されます。

use std::{future::Future, sync::Arc, time::Duration};

use tokio::sync::mpsc::{self, error::SendTimeoutError};

use crate::domain::{ChatMessage, ConnectionRegistry, FanOutOutcome, RelayEncoder, RelayError};

/// Relay キューと、それを消費する Broadcaster を作成
///
/// `capacity` が 0 の場合は 1 として扱います。
pub fn relay_queue(
    capacity: usize,
    enqueue_timeout: Duration,
    registry: Arc<dyn ConnectionRegistry>,
    encoder: Arc<dyn RelayEncoder>,
) -> (RelayQueue, RelayBroadcaster) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        RelayQueue {
            sender,
            enqueue_timeout,
        },
        RelayBroadcaster {
            receiver,
            registry,
            encoder,
        },
    )
}

/// Relay キューの投入側
#[derive(Clone)]
pub struct RelayQueue {
    sender: mpsc::Sender<ChatMessage>,
    enqueue_timeout: Duration,
}

impl RelayQueue {
    /// メッセージをキューに積む
    ///
    /// キューに空きがなければ `enqueue_timeout` まで待ち、それでも空かなければ破棄します。
    pub async fn enqueue(&self, message: ChatMessage) -> Result<(), RelayError> {
        match self.sender.send_timeout(message, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(RelayError::QueueFull),
            Err(SendTimeoutError::Closed(_)) => Err(RelayError::QueueClosed),
        }
    }
}

/// Relay キューの唯一の消費者
pub struct RelayBroadcaster {
    receiver: mpsc::Receiver<ChatMessage>,
    registry: Arc<dyn ConnectionRegistry>,
    encoder: Arc<dyn RelayEncoder>,
}

impl RelayBroadcaster {
    /// `shutdown` が完了するか、キューの投入側がすべて破棄されるまでメッセージを配送する
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!("Relay broadcaster started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Relay broadcaster received shutdown signal");
                    break;
                }
                message = self.receiver.recv() => match message {
                    Some(message) => {
                        if let Err(e) = self.broadcast(message).await {
                            tracing::error!("Failed to relay message: {}", e);
                        }
                    }
                    None => {
                        tracing::info!("Relay queue closed");
                        break;
                    }
                },
            }
        }

        tracing::info!("Relay broadcaster stopped");
    }

    /// 1 件のメッセージを Room の全接続へ fan-out
    pub async fn broadcast(&self, message: ChatMessage) -> Result<FanOutOutcome, RelayError> {
        let payload = self.encoder.encode(&message)?;

        let outcome = self.registry.fan_out(message.room(), &payload).await;
        match &outcome {
            FanOutOutcome::NoSubscribers => {
                tracing::info!("No connections for room ID: {}", message.room());
            }
            FanOutOutcome::Delivered { delivered, failed } => {
                tracing::debug!(
                    "Relayed message from '{}' to {} connection(s) in room '{}' ({} failed)",
                    message.sender(),
                    delivered,
                    message.room(),
                    failed.len()
                );
            }
        }
        Ok(outcome)
    }
}
