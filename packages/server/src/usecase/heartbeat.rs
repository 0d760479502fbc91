//! インスタンスの生存通知
//!
//! 各インスタンスは `instance:{id}` に最終生存時刻（ミリ秒）を定期的に書き込みます。
//! 起動時の復旧は、ルームを持つインスタンス（`host:{code}`）の生存時刻が新しければ
//! そのルームを奪いません。

use std::sync::Arc;

use gridword_shared::time::Clock;
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    domain::{SharedStore, StoreError, Timestamp},
};

/// 生存時刻がこの回数分の書き込み間隔より古ければ停止したとみなす
const MISSED_BEATS: u32 = 3;

pub fn instance_key(instance_id: &str) -> String {
    format!("instance:{}", instance_id)
}

pub struct InstanceHeartbeat {
    store: Arc<dyn SharedStore>,
    config: Arc<ServerConfig>,
    clock: Arc<dyn Clock>,
}

impl InstanceHeartbeat {
    pub fn new(
        store: Arc<dyn SharedStore>,
        config: Arc<ServerConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// 生存時刻を 1 回書き込む
    pub async fn beat(&self) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        self.store
            .set(&instance_key(&self.config.store.instance_id), now.to_string())
            .await
    }

    /// `relay_interval` ごとに書き込み続けるタスクを起動する
    pub fn spawn(self) -> JoinHandle<()> {
        let interval = self.config.store.relay_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.beat().await {
                    tracing::debug!("Heartbeat skipped: {}", e);
                }
            }
        })
    }
}

/// `instance_id` のインスタンスが `now` の時点で生存しているか
pub async fn is_alive(
    store: &dyn SharedStore,
    config: &ServerConfig,
    instance_id: &str,
    now: Timestamp,
) -> Result<bool, StoreError> {
    let Some(value) = store.get(&instance_key(instance_id)).await? else {
        return Ok(false);
    };
    let Ok(seen_at) = value.parse::<i64>() else {
        return Ok(false);
    };
    let max_age = config.store.relay_interval * MISSED_BEATS;
    let max_age_ms = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
    Ok(now.millis_since(Timestamp::new(seen_at)) <= max_age_ms)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gridword_shared::time::FixedClock;

    use super::*;
    use crate::infrastructure::store::InMemoryStore;

    #[tokio::test]
    async fn test_beat_marks_instance_alive_until_it_goes_stale() {
        // テスト項目: 書き込んだ生存時刻は猶予内なら生存、猶予を過ぎると停止とみなされる
        // given (前提条件):
        let store = Arc::new(InMemoryStore::new());
        let mut config = ServerConfig::default();
        config.store.instance_id = "instance-a".to_string();
        config.store.relay_interval = Duration::from_secs(5);
        let config = Arc::new(config);
        let heartbeat = InstanceHeartbeat::new(
            store.clone(),
            config.clone(),
            Arc::new(FixedClock::new(100_000)),
        );

        // when (操作):
        heartbeat.beat().await.unwrap();
        let fresh = is_alive(store.as_ref(), &config, "instance-a", Timestamp::new(115_000)).await;
        let stale = is_alive(store.as_ref(), &config, "instance-a", Timestamp::new(115_001)).await;
        let unknown = is_alive(store.as_ref(), &config, "instance-b", Timestamp::new(100_000)).await;

        // then (期待する結果):
        assert_eq!(fresh, Ok(true));
        assert_eq!(stale, Ok(false));
        assert_eq!(unknown, Ok(false));
    }
}
