//! UseCase: 共有ストアからのルーム復旧
//!
//! 起動時に `room:` で始まるスナップショットを読み込み、ワーカーを再起動します。
//! 中断したラウンドは打ち切って waiting に戻し、裁定待ちの単語は却下扱いにします。
//! プレイヤーは全員猶予期間に入り、期限内に再接続すれば状態を引き継げます。
//!
//! 複数インスタンスでストアを共有している場合、生存中の別インスタンスが動かしている
//! ルーム（`host:{code}` と `instance:{id}` の生存時刻で判定）は復旧しません。

use std::sync::Arc;

use gridword_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{Presence, Room, RoomCode, RoomPhase, SharedStore, StoreError, Timestamp},
};

use super::{heartbeat, room_registry::RoomRegistry};

pub struct RecoverRoomsUseCase {
    registry: Arc<RoomRegistry>,
    store: Arc<dyn SharedStore>,
    config: Arc<ServerConfig>,
    clock: Arc<dyn Clock>,
}

impl RecoverRoomsUseCase {
    pub fn new(
        registry: Arc<RoomRegistry>,
        store: Arc<dyn SharedStore>,
        config: Arc<ServerConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            config,
            clock,
        }
    }

    /// スナップショットからルームを復旧し、復旧した数を返す
    pub async fn execute(&self) -> Result<usize, StoreError> {
        let keys = self.store.scan(RoomCode::STORE_KEY_PREFIX).await?;
        let now = Timestamp::new(self.clock.now_millis());
        let mut recovered = 0;
        for key in keys {
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            let room: Room = match serde_json::from_str(&value) {
                Ok(room) => room,
                Err(e) => {
                    tracing::warn!("Skipping unreadable snapshot '{}': {}", key, e);
                    continue;
                }
            };
            if self.registry.contains(&room.code).await {
                continue;
            }
            if self.hosted_elsewhere(&room.code, now).await? {
                tracing::info!("Room {} is hosted by a live instance, not recovering", room.code);
                continue;
            }
            let Some(room) = self.prepare(room, now) else {
                tracing::info!("Dropping snapshot '{}' without players", key);
                self.store.delete(&key).await?;
                continue;
            };
            let code = room.code.clone();
            match self.registry.insert_room(room).await {
                Ok(_) => {
                    tracing::info!("Recovered room {}", code);
                    recovered += 1;
                }
                Err(e) => tracing::warn!("Could not recover room {}: {}", code, e),
            }
        }
        Ok(recovered)
    }

    async fn hosted_elsewhere(&self, code: &RoomCode, now: Timestamp) -> Result<bool, StoreError> {
        let Some(host) = self.store.get(&code.host_key()).await? else {
            return Ok(false);
        };
        if host == self.config.store.instance_id {
            return Ok(false);
        }
        heartbeat::is_alive(self.store.as_ref(), &self.config, &host, now).await
    }

    /// 復旧後の状態に整える（プレイヤーがいなければ `None`）
    fn prepare(&self, mut room: Room, now: Timestamp) -> Option<Room> {
        if room.players.is_empty() {
            return None;
        }
        let rejected = room.words.reject_all_pending();
        if rejected > 0 {
            tracing::debug!(
                "Room {}: {} pending word(s) rejected on recovery",
                room.code,
                rejected
            );
        }
        if room.phase != RoomPhase::Waiting {
            room.phase = RoomPhase::Waiting;
        }
        for player in room.players.iter_mut() {
            let grace = self.config.presence.grace_for(player.is_owner());
            let grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
            player.presence = Presence::GracePeriod {
                deadline: now.plus_millis(grace_ms),
            };
        }
        Some(room)
    }
}
