//! UseCase: プレイヤー切断処理
//!
//! ソケットが切れても、プレイヤーはすぐにはルームから外れません。所属ルームの
//! ワーカーに切断を伝え、猶予期間の判断はワーカーに任せます。

use std::sync::Arc;

use crate::domain::{MessagePusher, PlayerId, RoomCode};

use super::{rate_limiter::RateLimiter, room_registry::RoomRegistry, room_worker::RoomCommand};

/// プレイヤー切断のユースケース
pub struct DisconnectPlayerUseCase {
    message_pusher: Arc<dyn MessagePusher>,
    registry: Arc<RoomRegistry>,
    rate_limiter: Arc<RateLimiter>,
}

impl DisconnectPlayerUseCase {
    pub fn new(
        message_pusher: Arc<dyn MessagePusher>,
        registry: Arc<RoomRegistry>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            message_pusher,
            registry,
            rate_limiter,
        }
    }

    /// 切断を処理し、所属していたルームのコードを返す
    pub async fn execute(&self, player_id: &PlayerId) -> Option<RoomCode> {
        self.message_pusher.unregister_client(player_id).await;
        self.rate_limiter.forget(player_id).await;

        let code = self.registry.room_of(player_id).await?;
        match self.registry.get(&code).await {
            Some(handle) => {
                let _ = handle.send(RoomCommand::Disconnect {
                    player: player_id.clone(),
                });
                Some(code)
            }
            None => {
                self.registry.unbind(player_id, &code).await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{RateLimitConfig, ServerConfig},
        domain::{EventKind, Presence},
        usecase::test_support::{RecordingPusher, fixed_room, name, pid, test_deps},
    };

    #[tokio::test]
    async fn test_disconnect_puts_player_in_grace_period() {
        // テスト項目: 切断するとルームのプレイヤーが猶予期間に入り、バケットが破棄される
        // given (前提条件):
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher.clone(), None, ServerConfig::default()));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
        let handle = registry.insert_room(fixed_room("777777")).await.unwrap();
        handle.join(pid("alice"), name("Alice")).await.unwrap();
        handle.join(pid("bob"), name("Bob")).await.unwrap();
        registry.bind(pid("bob"), handle.code().clone()).await;
        rate_limiter.check(&pid("bob"), EventKind::Chat).await.unwrap();
        let usecase = DisconnectPlayerUseCase::new(pusher, registry, rate_limiter.clone());

        // when (操作):
        let code = usecase.execute(&pid("bob")).await;
        let room = handle.snapshot().await.unwrap();

        // then (期待する結果):
        assert_eq!(code, Some(handle.code().clone()));
        assert!(matches!(
            room.player(&pid("bob")).unwrap().presence,
            Presence::GracePeriod { .. }
        ));
        assert!(room.player(&pid("alice")).unwrap().is_connected());
        assert_eq!(rate_limiter.tracked_buckets().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_without_room() {
        // テスト項目: どのルームにも所属していなければ何もしない
        // given (前提条件):
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher.clone(), None, ServerConfig::default()));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
        let usecase = DisconnectPlayerUseCase::new(pusher, registry, rate_limiter);

        // when (操作):
        let code = usecase.execute(&pid("ghost")).await;

        // then (期待する結果):
        assert_eq!(code, None);
    }
}
