//! ルームから送り出されるイベント
//!
//! ワーカーはこれらのイベントを `MessagePusher` に渡し、ワイヤ形式への変換は
//! Infrastructure 層の DTO が担当します。共有ストアへの公開（インスタンス間の
//! ファンアウト）にはこの型の JSON 表現をそのまま使います。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    DisplayName, GameError, Grid, Locale, MessageContent, PlayerId, Presence, RejectReason, Role,
    Room, RoomCode, RoomPhase, ScoreLine, Timestamp,
};

/// クライアントから届くイベントの種類（レート制限のキー）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    CreateRoom,
    Join,
    Start,
    SubmitWord,
    EndEarly,
    ResolveReview,
    Leave,
    CloseRoom,
    Chat,
    Heartbeat,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CreateRoom => "create-room",
            EventKind::Join => "join",
            EventKind::Start => "start",
            EventKind::SubmitWord => "submit-word",
            EventKind::EndEarly => "end-early",
            EventKind::ResolveReview => "resolve-review",
            EventKind::Leave => "leave",
            EventKind::CloseRoom => "close-room",
            EventKind::Chat => "chat",
            EventKind::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ルームが閉じられた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    /// オーナーが猶予期間内に戻らず、引き継ぐ参加者もいない
    OwnerLeft,
    /// オーナーが明示的に閉じた
    ClosedByOwner,
    /// ラウンド終了後に一定時間操作がなかった
    Idle,
    /// 全員が退出した
    Empty,
}

/// 参加者の公開情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: DisplayName,
    pub role: Role,
    pub connected: bool,
    pub score: u32,
    pub combo: u32,
}

/// ルームの公開情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub code: RoomCode,
    pub locale: Locale,
    pub phase: RoomPhase,
    pub round: u32,
    pub duration_secs: u64,
    pub owner: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub grid: Option<Grid>,
    pub created_at: Timestamp,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            code: room.code.clone(),
            locale: room.locale,
            phase: room.phase,
            round: room.round,
            duration_secs: room.settings.duration_secs,
            owner: room.owner.clone(),
            players: room
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    role: p.role,
                    connected: p.presence == Presence::Connected,
                    score: p.score,
                    combo: p.combo,
                })
                .collect(),
            grid: room.grid.clone(),
            created_at: room.created_at,
        }
    }
}

/// サーバーからクライアントへのイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    /// 参加（再接続）完了。再接続時はプレイヤーの現在の状態を再送する
    Joined {
        room: RoomView,
        you: PlayerId,
        reconnected: bool,
        found_words: Vec<String>,
        pending_words: Vec<String>,
        remaining_secs: Option<u64>,
    },
    RosterUpdated {
        room: RoomCode,
        owner: Option<PlayerId>,
        players: Vec<PlayerView>,
    },
    RoundStarted {
        room: RoomCode,
        round: u32,
        grid: Grid,
        duration_secs: u64,
    },
    TimeRemaining {
        room: RoomCode,
        seconds: u64,
    },
    WordAccepted {
        room: RoomCode,
        player: PlayerId,
        word: String,
        points: u32,
        combo_level: u32,
        score: u32,
    },
    WordRejected {
        room: RoomCode,
        word: String,
        reason: RejectReason,
    },
    WordPendingArbitration {
        room: RoomCode,
        word: String,
    },
    RoundEnded {
        room: RoomCode,
        round: u32,
    },
    ReviewRequired {
        room: RoomCode,
        words: Vec<String>,
    },
    RoundFinalized {
        room: RoomCode,
        round: u32,
        scores: Vec<ScoreLine>,
    },
    RateLimited {
        event_type: EventKind,
    },
    OwnerTransferred {
        room: RoomCode,
        new_owner: PlayerId,
    },
    RoomClosed {
        room: RoomCode,
        reason: CloseReason,
    },
    Chat {
        room: RoomCode,
        from: PlayerId,
        name: DisplayName,
        content: MessageContent,
        timestamp: Timestamp,
    },
    HeartbeatAck {
        timestamp: Timestamp,
    },
    /// 操作を行ったプレイヤーだけに送られるエラー
    Error {
        code: String,
        message: String,
    },
}

impl From<GameError> for GameEvent {
    fn from(err: GameError) -> Self {
        match err {
            GameError::RateLimited(kind) => GameEvent::RateLimited { event_type: kind },
            other => GameEvent::Error {
                code: other.code().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl GameEvent {
    /// イベント名（ログ用）
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Joined { .. } => "joined",
            GameEvent::RosterUpdated { .. } => "roster-updated",
            GameEvent::RoundStarted { .. } => "round-started",
            GameEvent::TimeRemaining { .. } => "time-remaining",
            GameEvent::WordAccepted { .. } => "word-accepted",
            GameEvent::WordRejected { .. } => "word-rejected",
            GameEvent::WordPendingArbitration { .. } => "word-pending-arbitration",
            GameEvent::RoundEnded { .. } => "round-ended",
            GameEvent::ReviewRequired { .. } => "review-required",
            GameEvent::RoundFinalized { .. } => "round-finalized",
            GameEvent::RateLimited { .. } => "rate-limited",
            GameEvent::OwnerTransferred { .. } => "owner-transferred",
            GameEvent::RoomClosed { .. } => "room-closed",
            GameEvent::Chat { .. } => "chat",
            GameEvent::HeartbeatAck { .. } => "heartbeat-ack",
            GameEvent::Error { .. } => "error",
        }
    }

    pub fn roster(room: &Room) -> Self {
        let view = RoomView::from(room);
        GameEvent::RosterUpdated {
            room: view.code,
            owner: view.owner,
            players: view.players,
        }
    }
}
