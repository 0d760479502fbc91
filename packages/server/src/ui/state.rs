//! Server state shared by the handlers.

use std::sync::Arc;

use crate::{
    domain::SharedStore,
    usecase::{
        ConnectPlayerUseCase, DisconnectPlayerUseCase, GetRoomDetailUseCase, GetRoomsUseCase,
        HandleActionUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectPlayerUseCase（接続登録のユースケース）
    pub connect_player_usecase: Arc<ConnectPlayerUseCase>,
    /// DisconnectPlayerUseCase（切断処理のユースケース）
    pub disconnect_player_usecase: Arc<DisconnectPlayerUseCase>,
    /// HandleActionUseCase（プレイヤー操作のユースケース）
    pub handle_action_usecase: Arc<HandleActionUseCase>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
}

/// State of the shared store service
pub struct StoreState {
    /// Backing store exposed over HTTP and WebSocket
    pub store: Arc<dyn SharedStore>,
}
