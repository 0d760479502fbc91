//! MessagePusher trait 定義
//!
//! ドメイン層が必要とする「クライアントへの通知」のインターフェースを定義します。
//! WebSocket などの具体的な送信手段は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{GameEvent, MessagePushError, PlayerId};

/// クライアントへの送信チャンネル（シリアライズ済みのメッセージを流す）
pub type PusherChannel = mpsc::UnboundedSender<String>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// クライアントを登録（同じ ID が接続中なら `AlreadyConnected`）
    async fn register_client(
        &self,
        player_id: PlayerId,
        sender: PusherChannel,
    ) -> Result<(), MessagePushError>;

    async fn unregister_client(&self, player_id: &PlayerId);

    /// 特定のクライアントに送信
    async fn push_to(
        &self,
        player_id: &PlayerId,
        event: &GameEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数のクライアントに送信（一部の送信失敗は許容）
    async fn broadcast(&self, targets: &[PlayerId], event: &GameEvent);
}
