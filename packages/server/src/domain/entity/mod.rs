//! ドメインエンティティ

mod found_word;
mod player;
mod room;

pub use found_word::{FoundWord, ValidationOutcome, WordLedger};
pub use player::{Player, Presence, Role};
pub use room::{GridSource, Room, RoundSettings, ScoreLine};
