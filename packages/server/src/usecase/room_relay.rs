//! 他のインスタンスが持つルームのイベント中継
//!
//! 共有ストアのスナップショット一覧から、このインスタンスでは動いていないルームを
//! 見つけてそのチャンネルを購読し、届いたイベントを自分に接続している宛先へ送ります。
//! 別のインスタンスへ再接続したプレイヤーも、元のルームの進行を受け取り続けられます。
//!
//! 自分が公開したイベントと、このインスタンスのルームに所属しているプレイヤーは
//! 中継の対象外です（ルームワーカーが直接送っているため）。

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
};

use super::{replication::RelayedEvent, room_registry::RoomRegistry};
use crate::domain::{GameEvent, RoomCode, SharedStore, StoreError};

pub struct RoomRelay {
    registry: Arc<RoomRegistry>,
    store: Arc<dyn SharedStore>,
    followed: Mutex<HashMap<RoomCode, JoinHandle<()>>>,
}

impl RoomRelay {
    pub fn new(registry: Arc<RoomRegistry>, store: Arc<dyn SharedStore>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            store,
            followed: Mutex::new(HashMap::new()),
        })
    }

    /// `relay_interval` ごとに [`RoomRelay::sync`] を繰り返すタスクを起動する
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let relay = self.clone();
        let interval = self.registry.deps().config.store.relay_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match relay.sync().await {
                    Ok(_) => {}
                    Err(StoreError::Unavailable) => {
                        tracing::debug!("Store unavailable, relay sync skipped");
                    }
                    Err(e) => tracing::warn!("Relay sync failed: {}", e),
                }
            }
        })
    }

    /// 購読対象をストアのルーム一覧に合わせ、購読中のルーム数を返す
    pub async fn sync(&self) -> Result<usize, StoreError> {
        let keys = self.store.scan(RoomCode::STORE_KEY_PREFIX).await?;
        let mut remote = HashSet::new();
        for code in keys.iter().filter_map(|key| RoomCode::from_store_key(key)) {
            if !self.registry.contains(&code).await {
                remote.insert(code);
            }
        }

        let mut followed = self.followed.lock().await;
        followed.retain(|code, task| {
            let keep = remote.contains(code) && !task.is_finished();
            if !keep {
                task.abort();
                tracing::debug!("Relay stopped following room {}", code);
            }
            keep
        });

        for code in remote {
            if followed.contains_key(&code) {
                continue;
            }
            let rx = match self.store.subscribe(&code.store_key()).await {
                Ok(rx) => rx,
                Err(e) => {
                    tracing::debug!("Relay could not follow room {}: {}", code, e);
                    continue;
                }
            };
            tracing::info!("Relay following room {} hosted elsewhere", code);
            let task = tokio::spawn(forward(self.registry.clone(), code.clone(), rx));
            followed.insert(code, task);
        }
        Ok(followed.len())
    }
}

async fn forward(
    registry: Arc<RoomRegistry>,
    code: RoomCode,
    mut rx: broadcast::Receiver<String>,
) {
    let origin = registry.deps().config.store.instance_id.clone();
    let pusher = registry.deps().message_pusher.clone();
    loop {
        let payload = match rx.recv().await {
            Ok(payload) => payload,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Relay for room {} skipped {} events", code, skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let relayed: RelayedEvent = match serde_json::from_str(&payload) {
            Ok(relayed) => relayed,
            Err(e) => {
                tracing::warn!("Unreadable event on room {}: {}", code, e);
                continue;
            }
        };
        if relayed.origin == origin {
            continue;
        }
        let mut targets = Vec::new();
        for player in relayed.recipients {
            if registry.room_of(&player).await.is_none() {
                targets.push(player);
            }
        }
        if !targets.is_empty() {
            pusher.broadcast(&targets, &relayed.event).await;
        }
        if matches!(relayed.event, GameEvent::RoomClosed { .. }) {
            break;
        }
    }
    tracing::debug!("Relay for room {} finished", code);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::ServerConfig,
        domain::{CloseReason, MockSharedStore, PlayerId},
        usecase::test_support::{RecordingPusher, fixed_room, name, pid, test_deps},
    };

    fn chat(room: &str, text: &str) -> GameEvent {
        GameEvent::Chat {
            room: RoomCode::parse(room).unwrap(),
            from: pid("alice"),
            name: name("Alice"),
            content: text.to_string().try_into().unwrap(),
            timestamp: crate::domain::Timestamp::new(0),
        }
    }

    fn relayed(origin: &str, recipients: &[&str], event: GameEvent) -> String {
        serde_json::to_string(&RelayedEvent {
            origin: origin.to_string(),
            recipients: recipients.iter().map(|p| pid(p)).collect(),
            event,
        })
        .unwrap()
    }

    /// 受信イベントが `count` 件になるまで待つ
    async fn wait_for_events(pusher: &RecordingPusher, player: &PlayerId, count: usize) {
        for _ in 0..100 {
            if pusher.events_for(player).len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_forwards_events_from_other_instances() {
        // テスト項目: 他のインスタンスが公開したイベントだけが、ローカルのルームに所属していない宛先へ届く
        // given (前提条件):
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher.clone(), None, ServerConfig::default()));
        let own_origin = registry.deps().config.store.instance_id.clone();
        registry.insert_room(fixed_room("222222")).await.unwrap();
        registry.bind(pid("carol"), RoomCode::parse("222222").unwrap()).await;

        let (tx, _) = broadcast::channel::<String>(16);
        let subscriber = tx.clone();
        let mut store = MockSharedStore::new();
        store
            .expect_scan()
            .returning(|_| Ok(vec!["room:111111".to_string(), "room:222222".to_string()]));
        store
            .expect_subscribe()
            .withf(|channel| channel == "room:111111")
            .times(1)
            .returning(move |_| Ok(subscriber.subscribe()));
        let relay = RoomRelay::new(registry, Arc::new(store));

        // when (操作):
        let followed = relay.sync().await.unwrap();
        tx.send(relayed(&own_origin, &["bob"], chat("111111", "echo"))).unwrap();
        tx.send(relayed("instance-b", &["bob", "carol"], chat("111111", "hello"))).unwrap();
        wait_for_events(&pusher, &pid("bob"), 1).await;

        // then (期待する結果):
        assert_eq!(followed, 1);
        assert_eq!(pusher.events_for(&pid("bob")), vec![chat("111111", "hello")]);
        assert!(pusher.events_for(&pid("carol")).is_empty());
    }

    #[tokio::test]
    async fn test_stops_following_rooms_gone_from_store() {
        // テスト項目: ストアから消えたルームの購読をやめ、閉じたルームの購読は終了する
        // given (前提条件):
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher.clone(), None, ServerConfig::default()));
        let (tx, _) = broadcast::channel::<String>(16);
        let subscriber = tx.clone();
        let mut store = MockSharedStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_scan()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec!["room:111111".to_string()]));
        store
            .expect_scan()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Vec::new()));
        store
            .expect_subscribe()
            .times(1)
            .returning(move |_| Ok(subscriber.subscribe()));
        let relay = RoomRelay::new(registry, Arc::new(store));

        // when (操作):
        let before = relay.sync().await.unwrap();
        tx.send(relayed(
            "instance-b",
            &["bob"],
            GameEvent::RoomClosed {
                room: RoomCode::parse("111111").unwrap(),
                reason: CloseReason::ClosedByOwner,
            },
        ))
        .unwrap();
        wait_for_events(&pusher, &pid("bob"), 1).await;
        let after = relay.sync().await.unwrap();

        // then (期待する結果):
        assert_eq!(before, 1);
        assert_eq!(after, 0);
        assert!(matches!(
            pusher.events_for(&pid("bob"))[..],
            [GameEvent::RoomClosed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        // テスト項目: ストアの一覧取得に失敗した場合はエラーを返す
        // given (前提条件):
        let pusher = RecordingPusher::new();
        let registry = RoomRegistry::new(test_deps(pusher, None, ServerConfig::default()));
        let mut store = MockSharedStore::new();
        store.expect_scan().returning(|_| Err(StoreError::Unavailable));
        store.expect_subscribe().times(0);
        let relay = RoomRelay::new(registry, Arc::new(store));

        // when (操作):
        let result = relay.sync().await;

        // then (期待する結果):
        assert_eq!(result, Err(StoreError::Unavailable));
    }
}
