//! UseCase: プレイヤーの操作の振り分け
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - HandleActionUseCase::execute() メソッド
//! - レート制限、ルームの作成と参加、所属の付け替え、ハートビート
//!
//! ### なぜこのテストが必要か
//! - 全ての受信メッセージがここを通るため、エラーが操作した本人にだけ届くことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：ルーム作成 → 別プレイヤーの参加
//! - 異常系：存在しないルームへの参加、レート制限超過
//! - エッジケース：別のルームへの参加で以前のルームから退出する

use std::sync::Arc;

use crate::domain::{
    DisplayName, EventKind, GameError, GameEvent, MessageContent, MessagePusher, PlayerId,
    RoomCode, Timestamp, Verdict,
};

use super::{
    create_room::{CreateRoomRequest, CreateRoomUseCase},
    rate_limiter::RateLimiter,
    room_registry::RoomRegistry,
    room_worker::{RoomCommand, RoomHandle},
};

/// プレイヤーが送る操作
#[derive(Debug, Clone)]
pub enum PlayerAction {
    CreateRoom {
        name: DisplayName,
        request: CreateRoomRequest,
    },
    Join {
        room: RoomCode,
        name: DisplayName,
    },
    Start {
        room: RoomCode,
    },
    SubmitWord {
        room: RoomCode,
        word: String,
    },
    EndEarly {
        room: RoomCode,
    },
    ResolveReview {
        room: RoomCode,
        word: String,
        verdict: Verdict,
    },
    Leave {
        room: RoomCode,
    },
    CloseRoom {
        room: RoomCode,
    },
    Chat {
        room: RoomCode,
        content: MessageContent,
    },
    Heartbeat,
}

impl PlayerAction {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerAction::CreateRoom { .. } => EventKind::CreateRoom,
            PlayerAction::Join { .. } => EventKind::Join,
            PlayerAction::Start { .. } => EventKind::Start,
            PlayerAction::SubmitWord { .. } => EventKind::SubmitWord,
            PlayerAction::EndEarly { .. } => EventKind::EndEarly,
            PlayerAction::ResolveReview { .. } => EventKind::ResolveReview,
            PlayerAction::Leave { .. } => EventKind::Leave,
            PlayerAction::CloseRoom { .. } => EventKind::CloseRoom,
            PlayerAction::Chat { .. } => EventKind::Chat,
            PlayerAction::Heartbeat => EventKind::Heartbeat,
        }
    }
}

/// 操作振り分けのユースケース
pub struct HandleActionUseCase {
    registry: Arc<RoomRegistry>,
    create_room: Arc<CreateRoomUseCase>,
    rate_limiter: Arc<RateLimiter>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl HandleActionUseCase {
    pub fn new(
        registry: Arc<RoomRegistry>,
        create_room: Arc<CreateRoomUseCase>,
        rate_limiter: Arc<RateLimiter>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            create_room,
            rate_limiter,
            message_pusher,
        }
    }

    /// 操作を実行する。失敗は操作したプレイヤーにだけ通知される
    pub async fn execute(&self, player: &PlayerId, action: PlayerAction) {
        let kind = action.kind();
        let result = match self.rate_limiter.check(player, kind).await {
            Ok(()) => self.dispatch(player, action).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::debug!("{} from '{}' failed: {}", kind, player, e);
            self.reject(player, e).await;
        }
    }

    /// 操作を解釈できなかった場合などにエラーを本人へ送る
    pub async fn reject(&self, player: &PlayerId, error: GameError) {
        let event = GameEvent::from(error);
        if let Err(e) = self.message_pusher.push_to(player, &event).await {
            tracing::debug!("Could not deliver error to '{}': {}", player, e);
        }
    }

    async fn dispatch(&self, player: &PlayerId, action: PlayerAction) -> Result<(), GameError> {
        let player = player.clone();
        match action {
            PlayerAction::CreateRoom { name, request } => {
                let handle = self.create_room.execute(request).await?;
                self.join(&handle, player, name).await
            }
            PlayerAction::Join { room, name } => {
                let handle = self.registry.require(&room).await?;
                self.join(&handle, player, name).await
            }
            PlayerAction::Start { room } => {
                self.send(&room, RoomCommand::Start { player }).await
            }
            PlayerAction::SubmitWord { room, word } => {
                self.send(&room, RoomCommand::SubmitWord { player, word })
                    .await
            }
            PlayerAction::EndEarly { room } => {
                self.send(&room, RoomCommand::EndEarly { player }).await
            }
            PlayerAction::ResolveReview {
                room,
                word,
                verdict,
            } => {
                self.send(
                    &room,
                    RoomCommand::ResolveReview {
                        player,
                        word,
                        verdict,
                    },
                )
                .await
            }
            PlayerAction::Leave { room } => {
                self.registry.unbind(&player, &room).await;
                self.send(&room, RoomCommand::Leave { player }).await
            }
            PlayerAction::CloseRoom { room } => {
                self.send(&room, RoomCommand::Close { player }).await
            }
            PlayerAction::Chat { room, content } => {
                self.send(&room, RoomCommand::Chat { player, content })
                    .await
            }
            PlayerAction::Heartbeat => {
                let timestamp = Timestamp::new(self.registry.deps().clock.now_millis());
                self.message_pusher
                    .push_to(&player, &GameEvent::HeartbeatAck { timestamp })
                    .await
                    .map_err(|e| GameError::InvalidInput(e.to_string()))
            }
        }
    }

    /// ルームに参加し、所属を付け替える（以前のルームからは退出する）
    async fn join(
        &self,
        handle: &RoomHandle,
        player: PlayerId,
        name: DisplayName,
    ) -> Result<(), GameError> {
        handle.join(player.clone(), name).await?;
        let code = handle.code().clone();
        let previous = self.registry.bind(player.clone(), code.clone()).await;
        if let Some(previous) = previous.filter(|prev| prev != &code) {
            if let Some(old) = self.registry.get(&previous).await {
                tracing::info!("Player '{}' moved from room {} to {}", player, previous, code);
                let _ = old.send(RoomCommand::Leave { player });
            }
        }
        Ok(())
    }

    async fn send(&self, room: &RoomCode, command: RoomCommand) -> Result<(), GameError> {
        self.registry.require(room).await?.send(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ServerConfig,
        usecase::{
            DisconnectPlayerUseCase,
            test_support::{RecordingPusher, cats_grid, name, pid, test_deps},
        },
    };

    struct Fixture {
        pusher: Arc<RecordingPusher>,
        registry: Arc<RoomRegistry>,
        rate_limiter: Arc<RateLimiter>,
        usecase: HandleActionUseCase,
    }

    fn create_fixture() -> Fixture {
        let config = ServerConfig::default();
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher.clone(), None, config.clone()));
        let create_room = Arc::new(CreateRoomUseCase::new(
            registry.clone(),
            None,
            Arc::new(config.clone()),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let usecase = HandleActionUseCase::new(
            registry.clone(),
            create_room,
            rate_limiter.clone(),
            pusher.clone(),
        );
        Fixture {
            pusher,
            registry,
            rate_limiter,
            usecase,
        }
    }

    fn create_action(player_name: &str) -> PlayerAction {
        PlayerAction::CreateRoom {
            name: name(player_name),
            request: CreateRoomRequest {
                grid: Some(cats_grid()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_room_then_join() {
        // テスト項目: ルームを作成した本人はオーナーとして参加し、他のプレイヤーも参加できる
        // given (前提条件):
        let f = create_fixture();
        f.usecase.execute(&pid("alice"), create_action("Alice")).await;
        let code = f.registry.room_of(&pid("alice")).await.unwrap();

        // when (操作):
        f.usecase
            .execute(
                &pid("bob"),
                PlayerAction::Join {
                    room: code.clone(),
                    name: name("Bob"),
                },
            )
            .await;
        let room = f.registry.require(&code).await.unwrap().snapshot().await.unwrap();

        // then (期待する結果):
        assert!(room.is_owner(&pid("alice")));
        assert_eq!(room.players.len(), 2);
        assert_eq!(f.registry.room_of(&pid("bob")).await, Some(code));
    }

    #[tokio::test]
    async fn test_join_unknown_room_reports_error_to_initiator() {
        // テスト項目: 存在しないルームへの参加は本人にだけ roomNotFound が届く
        // given (前提条件):
        let f = create_fixture();

        // when (操作):
        f.usecase
            .execute(
                &pid("bob"),
                PlayerAction::Join {
                    room: RoomCode::parse("999999").unwrap(),
                    name: name("Bob"),
                },
            )
            .await;

        // then (期待する結果):
        let events = f.pusher.all_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &f.pusher.events_for(&pid("bob"))[0],
            GameEvent::Error { code, .. } if code == "roomNotFound"
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_action_is_not_dispatched() {
        // テスト項目: レート制限を超えた操作は rateLimited を返し、ルームに届かない
        // given (前提条件):
        let f = create_fixture();
        f.usecase.execute(&pid("alice"), create_action("Alice")).await;
        let code = f.registry.room_of(&pid("alice")).await.unwrap();
        let handle = f.registry.require(&code).await.unwrap();

        // when (操作):
        for i in 0..6 {
            let content = MessageContent::new(format!("msg {i}")).unwrap();
            f.usecase
                .execute(
                    &pid("alice"),
                    PlayerAction::Chat {
                        room: code.clone(),
                        content,
                    },
                )
                .await;
        }
        for _ in 0..5 {
            f.usecase
                .execute(
                    &pid("alice"),
                    PlayerAction::SubmitWord {
                        room: code.clone(),
                        word: "CAT".to_string(),
                    },
                )
                .await;
        }
        handle.snapshot().await.unwrap();

        // then (期待する結果):
        let events = f.pusher.events_for(&pid("alice"));
        let limited: Vec<&GameEvent> = events
            .iter()
            .filter(|e| matches!(e, GameEvent::RateLimited { .. }))
            .collect();
        assert_eq!(limited.len(), 1);
        assert_eq!(
            limited[0],
            &GameEvent::RateLimited {
                event_type: EventKind::SubmitWord
            }
        );
        let chats = events
            .iter()
            .filter(|e| matches!(e, GameEvent::Chat { .. }))
            .count();
        assert_eq!(chats, 6);
    }

    #[tokio::test]
    async fn test_joining_another_room_leaves_previous() {
        // テスト項目: 別のルームに参加すると以前のルームから退出する
        // given (前提条件):
        let f = create_fixture();
        f.usecase.execute(&pid("alice"), create_action("Alice")).await;
        f.usecase.execute(&pid("bob"), create_action("Bob")).await;
        let first = f.registry.room_of(&pid("alice")).await.unwrap();
        let second = f.registry.room_of(&pid("bob")).await.unwrap();

        // when (操作):
        f.usecase
            .execute(
                &pid("alice"),
                PlayerAction::Join {
                    room: second.clone(),
                    name: name("Alice"),
                },
            )
            .await;
        let joined = f.registry.require(&second).await.unwrap().snapshot().await.unwrap();
        // alice だけのルームは退出で閉じる
        for _ in 0..100 {
            if !f.registry.contains(&first).await {
                break;
            }
            tokio::task::yield_now().await;
        }

        // then (期待する結果):
        assert!(joined.player(&pid("alice")).is_some());
        assert!(!f.registry.contains(&first).await);
        assert_eq!(f.registry.room_of(&pid("alice")).await, Some(second));
    }

    #[tokio::test]
    async fn test_heartbeat_is_acknowledged() {
        // テスト項目: ハートビートには heartbeat-ack が返る
        // given (前提条件):
        let f = create_fixture();

        // when (操作):
        f.usecase.execute(&pid("alice"), PlayerAction::Heartbeat).await;

        // then (期待する結果):
        assert_eq!(
            f.pusher.events_for(&pid("alice")),
            vec![GameEvent::HeartbeatAck {
                timestamp: Timestamp::new(1_000_000)
            }]
        );
    }

    #[tokio::test]
    async fn test_disconnect_resets_rate_limit_buckets() {
        // テスト項目: 切断するとプレイヤーのバケットが破棄され、再接続後は新しいバーストが使える
        // given (前提条件):
        let f = create_fixture();
        f.usecase.execute(&pid("alice"), create_action("Alice")).await;
        let code = f.registry.room_of(&pid("alice")).await.unwrap();
        let submit = |word: &str| PlayerAction::SubmitWord {
            room: code.clone(),
            word: word.to_string(),
        };
        for _ in 0..5 {
            f.usecase.execute(&pid("alice"), submit("CAT")).await;
        }
        let tracked_before = f.rate_limiter.tracked_buckets().await;
        let disconnect = DisconnectPlayerUseCase::new(
            f.pusher.clone(),
            f.registry.clone(),
            f.rate_limiter.clone(),
        );

        // when (操作):
        disconnect.execute(&pid("alice")).await;
        let tracked_after = f.rate_limiter.tracked_buckets().await;
        for _ in 0..4 {
            f.usecase.execute(&pid("alice"), submit("CATS")).await;
        }

        // then (期待する結果):
        assert!(tracked_before > 0);
        assert_eq!(tracked_after, 0);
        let limited = f
            .pusher
            .events_for(&pid("alice"))
            .into_iter()
            .filter(|e| matches!(e, GameEvent::RateLimited { .. }))
            .count();
        assert_eq!(limited, 1);
    }
}
