//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - WebSocket の `UnboundedSender` を管理
//! - ドメインイベントを DTO に変換して JSON で送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に使用します。
//! 1 つのセッション ID に登録できる sender は 1 つだけです。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{GameEvent, MessagePushError, MessagePusher, PlayerId, PusherChannel},
    infrastructure::dto::websocket::ServerMessage,
};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの WebSocket sender
    clients: Arc<Mutex<HashMap<PlayerId, PusherChannel>>>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// イベントをワイヤ形式の JSON に変換
    fn encode(event: &GameEvent) -> Result<String, MessagePushError> {
        serde_json::to_string(&ServerMessage::from(event.clone()))
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))
    }

    pub async fn connected_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(
        &self,
        player_id: PlayerId,
        sender: PusherChannel,
    ) -> Result<(), MessagePushError> {
        let mut clients = self.clients.lock().await;
        if clients.contains_key(&player_id) {
            return Err(MessagePushError::AlreadyConnected(
                player_id.into_string(),
            ));
        }
        tracing::debug!("Client '{}' registered to MessagePusher", player_id);
        clients.insert(player_id, sender);
        Ok(())
    }

    async fn unregister_client(&self, player_id: &PlayerId) {
        let mut clients = self.clients.lock().await;
        clients.remove(player_id);
        tracing::debug!("Client '{}' unregistered from MessagePusher", player_id);
    }

    async fn push_to(
        &self,
        player_id: &PlayerId,
        event: &GameEvent,
    ) -> Result<(), MessagePushError> {
        let content = Self::encode(event)?;
        let clients = self.clients.lock().await;

        if let Some(sender) = clients.get(player_id) {
            sender
                .send(content)
                .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
            tracing::debug!("Pushed {} to client '{}'", event.name(), player_id);
            Ok(())
        } else {
            Err(MessagePushError::ClientNotFound(
                player_id.as_str().to_string(),
            ))
        }
    }

    async fn broadcast(&self, targets: &[PlayerId], event: &GameEvent) {
        if targets.is_empty() {
            return;
        }
        let content = match Self::encode(event) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to encode {}: {}", event.name(), e);
                return;
            }
        };
        let clients = self.clients.lock().await;

        for target in targets {
            if let Some(sender) = clients.get(target) {
                // ブロードキャストでは一部の送信失敗を許容
                if let Err(e) = sender.send(content.clone()) {
                    tracing::warn!("Failed to push message to client '{}': {}", target, e);
                }
            } else {
                tracing::debug!("Client '{}' not connected here, skipping", target);
            }
        }
    }
}
