//! UseCase: プレイヤー接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectPlayerUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 1 つのセッション ID に対してソケットは 1 本だけ、という前提を守る
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規セッションの接続
//! - 異常系：接続中のセッション ID での二重接続

use std::sync::Arc;

use gridword_shared::time::Clock;

use crate::domain::{MessagePushError, MessagePusher, PlayerId, PusherChannel, Timestamp};

use super::error::ConnectError;

/// プレイヤー接続のユースケース
pub struct ConnectPlayerUseCase {
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl ConnectPlayerUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            message_pusher,
            clock,
        }
    }

    /// 接続を登録する
    ///
    /// ルームへの参加（再接続を含む）は、接続後に `join` を送ることで行う。
    ///
    /// # Returns
    ///
    /// * `Ok(Timestamp)` - 接続時刻
    /// * `Err(ConnectError::DuplicateSession)` - 同じセッションが接続中
    pub async fn execute(
        &self,
        player_id: PlayerId,
        sender: PusherChannel,
    ) -> Result<Timestamp, ConnectError> {
        match self
            .message_pusher
            .register_client(player_id.clone(), sender)
            .await
        {
            Ok(()) => {}
            Err(MessagePushError::AlreadyConnected(id)) => {
                return Err(ConnectError::DuplicateSession(id));
            }
            Err(e) => {
                tracing::warn!("Unexpected error registering '{}': {}", player_id, e);
                return Err(ConnectError::DuplicateSession(player_id.into_string()));
            }
        }
        Ok(Timestamp::new(self.clock.now_millis()))
    }
}
