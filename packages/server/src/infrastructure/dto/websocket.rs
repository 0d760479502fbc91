//! WebSocket message DTOs.
//!
//! Every message is a JSON object tagged by `type` (kebab-case); field names
//! are snake_case.

use serde::{Deserialize, Serialize};

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateRoom {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_secs: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid_size: Option<usize>,
        /// Fixed board, one string per cell.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid: Option<Vec<Vec<String>>>,
    },
    Join {
        room: String,
        name: String,
    },
    Start {
        room: String,
    },
    SubmitWord {
        room: String,
        word: String,
    },
    EndEarly {
        room: String,
    },
    ResolveReview {
        room: String,
        word: String,
        verdict: VerdictDto,
    },
    Leave {
        room: String,
    },
    CloseRoom {
        room: String,
    },
    Chat {
        room: String,
        text: String,
    },
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictDto {
    Accepted,
    Rejected,
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    Joined {
        room: RoomInfo,
        you: String,
        reconnected: bool,
        found_words: Vec<String>,
        pending_words: Vec<String>,
        remaining_secs: Option<u64>,
    },
    RosterUpdated {
        room: String,
        owner: Option<String>,
        players: Vec<PlayerInfo>,
    },
    RoundStarted {
        room: String,
        round: u32,
        grid: Vec<Vec<String>>,
        duration_secs: u64,
    },
    TimeRemaining {
        room: String,
        seconds: u64,
    },
    WordAccepted {
        room: String,
        player: String,
        word: String,
        points: u32,
        combo_level: u32,
        score: u32,
    },
    WordRejected {
        room: String,
        word: String,
        reason: String,
    },
    WordPendingArbitration {
        room: String,
        word: String,
    },
    RoundEnded {
        room: String,
        round: u32,
    },
    ReviewRequired {
        room: String,
        words: Vec<String>,
    },
    RoundFinalized {
        room: String,
        round: u32,
        scores: Vec<ScoreInfo>,
    },
    RateLimited {
        event_type: String,
    },
    OwnerTransferred {
        room: String,
        new_owner: String,
    },
    RoomClosed {
        room: String,
        reason: String,
    },
    Chat {
        room: String,
        from: String,
        name: String,
        text: String,
        timestamp: i64,
    },
    HeartbeatAck {
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub code: String,
    pub locale: String,
    pub phase: String,
    pub round: u32,
    pub duration_secs: u64,
    pub owner: Option<String>,
    pub players: Vec<PlayerInfo>,
    pub grid: Option<Vec<Vec<String>>>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub role: String,
    pub connected: bool,
    pub score: u32,
    pub combo: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub player: String,
    pub name: String,
    pub score: u32,
    pub words: Vec<String>,
}
