//! 共有ストアへのベストエフォートなレプリケーション
//!
//! ルームワーカーはストアの応答を待たずに操作をキューへ積むだけです。
//! 1 ルームにつき 1 つのバックグラウンドタスクが操作を順番に処理するため、
//! 古いスナップショットが新しいものを上書きすることはありません。
//! 失敗はログに残して捨てます（メモリ上のルームが正）。
//!
//! 公開するイベントには送信元インスタンスと宛先の参加者を添えます。
//! 他のインスタンスの `RoomRelay` がこれを受け取り、自分に接続している宛先へ届けます。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{GameEvent, PlayerId, Room, RoomCode, SharedStore, StoreError};

/// ルームのチャンネルに流れるイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedEvent {
    /// 公開したインスタンスの ID
    pub origin: String,
    /// 接続状態を問わないルームの全参加者
    pub recipients: Vec<PlayerId>,
    pub event: GameEvent,
}

#[derive(Debug)]
enum ReplicationOp {
    Save { key: String, value: String },
    Publish { channel: String, payload: String },
    Remove { key: String },
}

/// ルームごとのレプリケーション送信口
#[derive(Debug, Clone)]
pub struct Replicator {
    tx: Option<mpsc::UnboundedSender<ReplicationOp>>,
    origin: String,
}

impl Replicator {
    /// ストアを使わない（メモリのみで動作する）
    pub fn disabled() -> Self {
        Self {
            tx: None,
            origin: String::new(),
        }
    }

    /// バックグラウンドタスクを起動する（`origin` は公開イベントに付けるインスタンス ID）
    pub fn spawn(store: Arc<dyn SharedStore>, origin: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ReplicationOp>();
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let (what, result) = match op {
                    ReplicationOp::Save { key, value } => {
                        let result = store.set(&key, value).await;
                        (key, result)
                    }
                    ReplicationOp::Publish { channel, payload } => {
                        let result = store.publish(&channel, payload).await;
                        (channel, result)
                    }
                    ReplicationOp::Remove { key } => {
                        let result = store.delete(&key).await;
                        (key, result)
                    }
                };
                match result {
                    Ok(()) => {}
                    Err(StoreError::Unavailable) => {
                        tracing::debug!("Store unavailable, skipped replication of '{}'", what);
                    }
                    Err(e) => {
                        tracing::warn!("Replication of '{}' failed: {}", what, e);
                    }
                }
            }
        });
        Self {
            tx: Some(tx),
            origin,
        }
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// このインスタンスがルームを動かしていることを記録する
    pub fn claim(&self, code: &RoomCode) {
        let Some(tx) = &self.tx else { return };
        let _ = tx.send(ReplicationOp::Save {
            key: code.host_key(),
            value: self.origin.clone(),
        });
    }

    /// ルームのスナップショットを保存
    pub fn save(&self, room: &Room) {
        let Some(tx) = &self.tx else { return };
        match serde_json::to_string(room) {
            Ok(value) => {
                let _ = tx.send(ReplicationOp::Save {
                    key: room.code.store_key(),
                    value,
                });
            }
            Err(e) => tracing::warn!("Failed to serialize room {}: {}", room.code, e),
        }
    }

    /// ルームのチャンネルにイベントを公開（インスタンス間のファンアウト）
    pub fn publish(&self, code: &RoomCode, event: &GameEvent, recipients: Vec<PlayerId>) {
        let Some(tx) = &self.tx else { return };
        let relayed = RelayedEvent {
            origin: self.origin.clone(),
            recipients,
            event: event.clone(),
        };
        match serde_json::to_string(&relayed) {
            Ok(payload) => {
                let _ = tx.send(ReplicationOp::Publish {
                    channel: code.store_key(),
                    payload,
                });
            }
            Err(e) => tracing::warn!("Failed to serialize {} event: {}", event.name(), e),
        }
    }

    /// ルームのスナップショットと所有の記録を削除
    pub fn remove(&self, code: &RoomCode) {
        let Some(tx) = &self.tx else { return };
        let _ = tx.send(ReplicationOp::Remove {
            key: code.store_key(),
        });
        let _ = tx.send(ReplicationOp::Remove {
            key: code.host_key(),
        });
    }
}
