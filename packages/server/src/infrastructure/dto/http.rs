//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Entry of `GET /api/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub code: String,
    pub locale: String,
    pub phase: String,
    pub round: u32,
    pub players: Vec<String>,
    pub created_at: String,
}

/// Body of `GET /api/rooms/{code}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub code: String,
    pub locale: String,
    pub phase: String,
    pub round: u32,
    pub duration_secs: u64,
    pub owner: Option<String>,
    pub players: Vec<PlayerDetailDto>,
    pub grid: Option<Vec<Vec<String>>>,
    pub found_words: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDetailDto {
    pub id: String,
    pub name: String,
    pub role: String,
    pub presence: String,
    pub score: u32,
    pub joined_at: String,
}
