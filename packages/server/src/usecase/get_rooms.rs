//! UseCase: ルーム一覧・詳細の取得

use std::sync::Arc;

use crate::domain::{Room, RoomCode};

use super::{error::GetRoomDetailError, room_registry::RoomRegistry};

/// ルーム一覧取得のユースケース
pub struct GetRoomsUseCase {
    registry: Arc<RoomRegistry>,
}

impl GetRoomsUseCase {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// 稼働中の全ルーム（ルームコード順）
    pub async fn execute(&self) -> Vec<Room> {
        self.registry.snapshots().await
    }
}

/// ルーム詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    registry: Arc<RoomRegistry>,
}

impl GetRoomDetailUseCase {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, code: &str) -> Result<Room, GetRoomDetailError> {
        let code = RoomCode::parse(code).map_err(|_| GetRoomDetailError::InvalidRoomCode)?;
        let handle = self
            .registry
            .get(&code)
            .await
            .ok_or(GetRoomDetailError::RoomNotFound)?;
        handle
            .snapshot()
            .await
            .map_err(|_| GetRoomDetailError::RoomNotFound)
    }
}
