//! ユースケースのテスト用ヘルパー

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use gridword_shared::time::FixedClock;

use super::{room_worker::WorkerDeps, validation_pipeline::ValidationPipeline};
use crate::{
    config::ServerConfig,
    domain::{
        ArbitrationOracle, DisplayName, GameEvent, Grid, GridSource, Locale, MessagePushError,
        MessagePusher, PlayerId, PusherChannel, Room, RoomCode, RoundSettings, Timestamp,
    },
    infrastructure::dictionary::InMemoryDictionary,
};

/// 送信されたイベントを記録する MessagePusher
#[derive(Default)]
pub struct RecordingPusher {
    events: Mutex<Vec<(PlayerId, GameEvent)>>,
    clients: Mutex<HashSet<PlayerId>>,
}

impl RecordingPusher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// プレイヤーが受け取ったイベント（受信順）
    pub fn events_for(&self, player: &PlayerId) -> Vec<GameEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == player)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// 全員分のイベント
    pub fn all_events(&self) -> Vec<GameEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(
        &self,
        player_id: PlayerId,
        _sender: PusherChannel,
    ) -> Result<(), MessagePushError> {
        let mut clients = self.clients.lock().unwrap();
        if !clients.insert(player_id.clone()) {
            return Err(MessagePushError::AlreadyConnected(player_id.into_string()));
        }
        Ok(())
    }

    async fn unregister_client(&self, player_id: &PlayerId) {
        self.clients.lock().unwrap().remove(player_id);
    }

    async fn push_to(
        &self,
        player_id: &PlayerId,
        event: &GameEvent,
    ) -> Result<(), MessagePushError> {
        self.events
            .lock()
            .unwrap()
            .push((player_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(&self, targets: &[PlayerId], event: &GameEvent) {
        let mut events = self.events.lock().unwrap();
        for target in targets {
            events.push((target.clone(), event.clone()));
        }
    }
}

pub fn pid(s: &str) -> PlayerId {
    PlayerId::new(s.to_string()).unwrap()
}

pub fn name(s: &str) -> DisplayName {
    DisplayName::new(s.to_string()).unwrap()
}

/// `[[C,A],[T,S]]`
pub fn cats_grid() -> Grid {
    Grid::new(vec![vec!['C', 'A'], vec!['T', 'S']]).unwrap()
}

pub fn test_dictionary() -> InMemoryDictionary {
    InMemoryDictionary::from_words(
        Locale::En,
        ["CAT", "CATS", "ACT", "ACTS", "SAT", "AT", "AS", "SCAT", "CAST"],
    )
}

pub fn test_deps(
    pusher: Arc<RecordingPusher>,
    oracle: Option<Arc<dyn ArbitrationOracle>>,
    config: ServerConfig,
) -> WorkerDeps {
    let pipeline = ValidationPipeline::new(
        Arc::new(test_dictionary()),
        oracle,
        Duration::from_secs(5),
        config.game.review_unknown_words,
    );
    WorkerDeps {
        config: Arc::new(config),
        message_pusher: pusher,
        pipeline: Arc::new(pipeline),
        store: None,
        clock: Arc::new(FixedClock::new(1_000_000)),
    }
}

/// `[[C,A],[T,S]]` 固定・60 秒のルーム
pub fn fixed_room(code: &str) -> Room {
    Room::new(
        RoomCode::parse(code).unwrap(),
        Locale::En,
        RoundSettings {
            duration_secs: 60,
            grid: GridSource::Fixed { grid: cats_grid() },
        },
        Timestamp::new(0),
        8,
    )
}
