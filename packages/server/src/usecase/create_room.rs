//! UseCase: ルーム作成
//!
//! ルームコードの発行は共有ストアのロック `lock:room-code` の下で行い、
//! 稼働中のルームとストア上のスナップショットの両方と衝突しないことを確認します。
//! ストアが使えない場合はローカルの衝突チェックだけで発行します。

use std::sync::Arc;

use crate::{
    config::ServerConfig,
    domain::{
        GameError, Grid, GridSource, LockToken, Locale, MAX_GRID_SIDE, Room, RoomCode,
        RoundSettings, SharedStore, StoreError, Timestamp,
    },
};

use super::{room_registry::RoomRegistry, room_worker::RoomHandle};

/// ルームコード発行用のロックキー
pub const ROOM_CODE_LOCK: &str = "lock:room-code";

/// 空きコードを探す回数の上限
const MAX_CODE_ATTEMPTS: usize = 64;

/// ルーム作成の入力
#[derive(Debug, Clone, Default)]
pub struct CreateRoomRequest {
    pub duration_secs: Option<u64>,
    pub locale: Option<Locale>,
    pub grid_size: Option<usize>,
    /// 固定の盤面（指定すると毎ラウンド同じ盤面を使う）
    pub grid: Option<Grid>,
}

/// ルーム作成のユースケース
pub struct CreateRoomUseCase {
    registry: Arc<RoomRegistry>,
    store: Option<Arc<dyn SharedStore>>,
    config: Arc<ServerConfig>,
}

impl CreateRoomUseCase {
    pub fn new(
        registry: Arc<RoomRegistry>,
        store: Option<Arc<dyn SharedStore>>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// ルームを作成してワーカーを起動する
    ///
    /// # Returns
    ///
    /// * `Ok(RoomHandle)` - 作成したルームの送信口（作成者はまだ参加していない）
    /// * `Err(GameError::InvalidInput)` - 設定値が範囲外
    /// * `Err(GameError::LockTimeout)` - 再試行してもロックを取得できなかった
    pub async fn execute(&self, request: CreateRoomRequest) -> Result<RoomHandle, GameError> {
        let locale = request.locale.unwrap_or_default();
        let settings = self.settings_for(&request)?;

        let lock = self.acquire_code_lock().await?;
        let result = self.issue_and_insert(locale, settings).await;
        if let Some(token) = lock {
            self.release_code_lock(&token).await;
        }
        result
    }

    /// 入力を検証してラウンド設定を作る
    fn settings_for(&self, request: &CreateRoomRequest) -> Result<RoundSettings, GameError> {
        let game = &self.config.game;
        let duration_secs = request.duration_secs.unwrap_or(game.default_duration_secs);
        if !(game.min_duration_secs..=game.max_duration_secs).contains(&duration_secs) {
            return Err(GameError::InvalidInput(format!(
                "duration must be {}-{} seconds",
                game.min_duration_secs, game.max_duration_secs
            )));
        }
        let grid = match (&request.grid, request.grid_size) {
            (Some(grid), _) => GridSource::Fixed { grid: grid.clone() },
            (None, size) => {
                let size = size.unwrap_or(game.default_grid_size);
                if !(2..=MAX_GRID_SIDE).contains(&size) {
                    return Err(GameError::InvalidInput(format!(
                        "grid size must be 2-{MAX_GRID_SIDE}"
                    )));
                }
                GridSource::Random { size }
            }
        };
        Ok(RoundSettings {
            duration_secs,
            grid,
        })
    }

    /// ロックを取得（1 回だけバックオフして再試行）
    ///
    /// ストアにエラーがあれば `Ok(None)`（ロックなしで続行）。
    async fn acquire_code_lock(&self) -> Result<Option<LockToken>, GameError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let store_config = &self.config.store;
        for attempt in 0..2 {
            match store
                .acquire_lock(ROOM_CODE_LOCK, store_config.lock_lease)
                .await
            {
                Ok(Some(token)) => return Ok(Some(token)),
                Ok(None) if attempt == 0 => {
                    tracing::debug!("Room code lock is held, retrying");
                    tokio::time::sleep(store_config.lock_retry_backoff).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Issuing room code without lock: {}", e);
                    return Ok(None);
                }
            }
        }
        Err(GameError::LockTimeout)
    }

    async fn release_code_lock(&self, token: &LockToken) {
        let Some(store) = &self.store else { return };
        match store.release_lock(ROOM_CODE_LOCK, token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Room code lock expired before release"),
            Err(e) => tracing::warn!("Failed to release room code lock: {}", e),
        }
    }

    async fn issue_and_insert(
        &self,
        locale: Locale,
        settings: RoundSettings,
    ) -> Result<RoomHandle, GameError> {
        let code = self.issue_code().await?;
        let created_at = Timestamp::new(self.registry.deps().clock.now_millis());
        let room = Room::new(
            code,
            locale,
            settings,
            created_at,
            self.config.game.max_players,
        );
        self.write_initial_snapshot(&room).await;
        let handle = self.registry.insert_room(room).await?;
        tracing::info!("Room {} created ({})", handle.code(), locale);
        Ok(handle)
    }

    /// 稼働中のルームともストアとも衝突しないコードを探す
    async fn issue_code(&self) -> Result<RoomCode, GameError> {
        let mut check_store = self.store.is_some();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = RoomCode::random(&mut rand::rng());
            if self.registry.contains(&code).await {
                continue;
            }
            if check_store {
                match self.exists_in_store(&code).await {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!("Room code check falls back to local rooms: {}", e);
                        check_store = false;
                    }
                }
            }
            return Ok(code);
        }
        Err(GameError::InvalidInput(
            "no free room code, try again".to_string(),
        ))
    }

    async fn exists_in_store(&self, code: &RoomCode) -> Result<bool, StoreError> {
        match &self.store {
            Some(store) => Ok(store.get(&code.store_key()).await?.is_some()),
            None => Ok(false),
        }
    }

    /// ロックを握っている間にスナップショットを書き、他インスタンスから見えるようにする
    async fn write_initial_snapshot(&self, room: &Room) {
        let Some(store) = &self.store else { return };
        match serde_json::to_string(room) {
            Ok(value) => {
                if let Err(e) = store.set(&room.code.store_key(), value).await {
                    tracing::warn!("Failed to write snapshot of room {}: {}", room.code, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize room {}: {}", room.code, e),
        }
    }
}
