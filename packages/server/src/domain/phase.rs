//! ルームのライフサイクル
//!
//! `waiting → active → ended → reviewing → waiting` の循環で、同じルームで
//! 何度でもラウンドを繰り返せます。許可されていない遷移は `InvalidTransition`
//! として拒否され、別の状態に読み替えることはありません。

use serde::{Deserialize, Serialize};

use super::GameError;

/// ルームのフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    #[default]
    Waiting,
    Active,
    Ended,
    Reviewing,
}

/// フェーズ遷移を引き起こす操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseAction {
    /// ラウンド開始（waiting → active）
    Start,
    /// ラウンド終了（active → ended）
    End,
    /// 審査開始（ended → reviewing）
    Review,
    /// 結果確定（ended / reviewing → waiting）
    Finalize,
}

impl RoomPhase {
    /// 遷移先のフェーズを返す
    pub fn transition(self, action: PhaseAction) -> Result<RoomPhase, GameError> {
        match (self, action) {
            (RoomPhase::Waiting, PhaseAction::Start) => Ok(RoomPhase::Active),
            (RoomPhase::Active, PhaseAction::End) => Ok(RoomPhase::Ended),
            (RoomPhase::Ended, PhaseAction::Review) => Ok(RoomPhase::Reviewing),
            (RoomPhase::Ended, PhaseAction::Finalize) => Ok(RoomPhase::Waiting),
            (RoomPhase::Reviewing, PhaseAction::Finalize) => Ok(RoomPhase::Waiting),
            (from, action) => Err(GameError::InvalidTransition { from, action }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomPhase::Waiting => "waiting",
            RoomPhase::Active => "active",
            RoomPhase::Ended => "ended",
            RoomPhase::Reviewing => "reviewing",
        }
    }
}
