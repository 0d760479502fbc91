//! ドメイン層
//!
//! ゲームのルール（盤面上の単語探索、採点、ルームのライフサイクル）と、
//! 外部の協調者（辞書、裁定サービス、共有ストア、通知）へのインターフェースを定義します。

pub mod arbitration;
pub mod board;
pub mod dictionary;
pub mod entity;
pub mod error;
pub mod event;
pub mod locale;
pub mod message_pusher;
pub mod phase;
pub mod rate_limit;
pub mod scoring;
pub mod store;
pub mod value_object;

pub use arbitration::{ArbitrationOracle, Verdict};
pub use board::{BoardIndex, Coord, Grid, MAX_GRID_SIDE, WordValidator};
pub use dictionary::Dictionary;
pub use entity::{
    FoundWord, GridSource, Player, Presence, Role, Room, RoundSettings, ScoreLine,
    ValidationOutcome, WordLedger,
};
pub use error::{
    GameError, MessagePushError, OracleError, RejectReason, StoreError, ValueObjectError,
};
pub use event::{CloseReason, EventKind, GameEvent, PlayerView, RoomView};
pub use locale::Locale;
pub use message_pusher::{MessagePusher, PusherChannel};
pub use phase::{PhaseAction, RoomPhase};
pub use rate_limit::{BucketPolicy, TokenBucket};
pub use store::{LockToken, SharedStore};
pub use value_object::{DisplayName, MessageContent, PlayerId, RoomCode, Timestamp};

#[cfg(test)]
pub use arbitration::MockArbitrationOracle;
#[cfg(test)]
pub use dictionary::MockDictionary;
#[cfg(test)]
pub use message_pusher::MockMessagePusher;
#[cfg(test)]
pub use store::MockSharedStore;
