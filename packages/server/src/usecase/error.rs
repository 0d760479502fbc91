//! UseCase 層のエラー定義

use thiserror::Error;

/// 接続処理のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// 同じセッション ID のクライアントが既に接続している
    #[error("session '{0}' is already connected")]
    DuplicateSession(String),
}

/// ルーム詳細取得のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room code is malformed")]
    InvalidRoomCode,
}
