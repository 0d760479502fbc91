//! UseCase 層
//!
//! ルームごとのワーカーと、接続・操作・照会のユースケースを提供します。

pub mod connect_player;
pub mod create_room;
pub mod disconnect_player;
pub mod error;
pub mod get_rooms;
pub mod handle_action;
pub mod heartbeat;
pub mod presence;
pub mod rate_limiter;
pub mod recover_rooms;
pub mod replication;
pub mod room_registry;
pub mod room_relay;
pub mod room_worker;
pub mod validation_pipeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use connect_player::ConnectPlayerUseCase;
pub use create_room::{CreateRoomRequest, CreateRoomUseCase};
pub use disconnect_player::DisconnectPlayerUseCase;
pub use error::{ConnectError, GetRoomDetailError};
pub use get_rooms::{GetRoomDetailUseCase, GetRoomsUseCase};
pub use handle_action::{HandleActionUseCase, PlayerAction};
pub use heartbeat::InstanceHeartbeat;
pub use rate_limiter::RateLimiter;
pub use recover_rooms::RecoverRoomsUseCase;
pub use room_registry::RoomRegistry;
pub use room_relay::RoomRelay;
pub use room_worker::{RoomCommand, RoomHandle, RoomWorker, WorkerDeps};
pub use validation_pipeline::ValidationPipeline;
