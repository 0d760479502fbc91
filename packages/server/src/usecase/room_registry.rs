//! ルームレジストリ
//!
//! 稼働中のルームワーカーの送信口と、プレイヤーがどのルームに所属しているかを
//! 管理します。ワーカーが終了するとエントリは自動的に取り除かれます。
//! どちらのテーブルのロックも、ルームの処理中に保持されることはありません。

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use tokio::sync::Mutex;

use super::room_worker::{RoomHandle, RoomWorker, WorkerDeps};
use crate::domain::{GameError, PlayerId, Room, RoomCode};

pub struct RoomRegistry {
    deps: WorkerDeps,
    rooms: Mutex<HashMap<RoomCode, RoomHandle>>,
    memberships: Mutex<HashMap<PlayerId, RoomCode>>,
}

impl RoomRegistry {
    pub fn new(deps: WorkerDeps) -> Arc<Self> {
        Arc::new(Self {
            deps,
            rooms: Mutex::new(HashMap::new()),
            memberships: Mutex::new(HashMap::new()),
        })
    }

    pub fn deps(&self) -> &WorkerDeps {
        &self.deps
    }

    /// ルームのワーカーを起動して登録する
    pub async fn insert_room(self: &Arc<Self>, room: Room) -> Result<RoomHandle, GameError> {
        let code = room.code.clone();
        let mut rooms = self.rooms.lock().await;
        if rooms.get(&code).is_some_and(|h| !h.is_closed()) {
            return Err(GameError::InvalidInput(format!(
                "room code {code} is already in use"
            )));
        }
        let (handle, task) = RoomWorker::spawn(room, self.deps.clone());
        rooms.insert(code.clone(), handle.clone());
        drop(rooms);

        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                tracing::error!("Room {} worker aborted: {}", code, e);
            }
            if let Some(registry) = registry.upgrade() {
                registry.remove_closed(&code).await;
            }
        });
        Ok(handle)
    }

    /// 終了したワーカーのエントリと所属情報を取り除く
    async fn remove_closed(&self, code: &RoomCode) {
        {
            let mut rooms = self.rooms.lock().await;
            if rooms.get(code).is_some_and(RoomHandle::is_closed) {
                rooms.remove(code);
            }
        }
        self.memberships
            .lock()
            .await
            .retain(|_, member_of| member_of != code);
        tracing::debug!("Room {} removed from registry", code);
    }

    pub async fn get(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms
            .lock()
            .await
            .get(code)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// ルームを取得（存在しなければ `RoomNotFound`）
    pub async fn require(&self, code: &RoomCode) -> Result<RoomHandle, GameError> {
        self.get(code)
            .await
            .ok_or_else(|| GameError::RoomNotFound(code.to_string()))
    }

    pub async fn contains(&self, code: &RoomCode) -> bool {
        self.get(code).await.is_some()
    }

    pub async fn codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<RoomCode> = self
            .rooms
            .lock()
            .await
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(code, _)| code.clone())
            .collect();
        codes.sort();
        codes
    }

    /// 全ルームの現在の状態（ルームコード順）
    pub async fn snapshots(&self) -> Vec<Room> {
        let handles: Vec<RoomHandle> = self.rooms.lock().await.values().cloned().collect();
        let mut rooms = Vec::with_capacity(handles.len());
        for handle in handles {
            // 取得中に閉じられたルームは含めない
            if let Ok(room) = handle.snapshot().await {
                rooms.push(room);
            }
        }
        rooms.sort_by(|a, b| a.code.cmp(&b.code));
        rooms
    }

    // ========================================
    // 所属
    // ========================================

    /// プレイヤーの所属ルームを記録し、以前の所属を返す
    pub async fn bind(&self, player: PlayerId, code: RoomCode) -> Option<RoomCode> {
        self.memberships.lock().await.insert(player, code)
    }

    pub async fn room_of(&self, player: &PlayerId) -> Option<RoomCode> {
        self.memberships.lock().await.get(player).cloned()
    }

    /// 指定のルームに所属している場合だけ所属を解除
    pub async fn unbind(&self, player: &PlayerId, code: &RoomCode) {
        let mut memberships = self.memberships.lock().await;
        if memberships.get(player) == Some(code) {
            memberships.remove(player);
        }
    }
}
