//! ドメイン層のエラー定義
//!
//! ルームのコマンド経路で発生するエラーは全て `GameError` に集約され、
//! 操作を行ったプレイヤーにだけ通知されます（ルーム全体には波及しません）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EventKind, PhaseAction, RoomPhase};

/// 値オブジェクトの生成エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueObjectError {
    /// プレイヤー ID が不正
    #[error("player id must be 1-64 characters of [A-Za-z0-9_-], got '{0}'")]
    InvalidPlayerId(String),

    /// 表示名が不正
    #[error("display name must be 1-24 printable characters")]
    InvalidDisplayName,

    /// ルームコードが不正
    #[error("room code must be exactly 6 digits, got '{0}'")]
    InvalidRoomCode(String),

    /// チャット本文が不正
    #[error("message content must be 1-500 characters")]
    InvalidMessageContent,

    /// 未対応のロケール
    #[error("unsupported locale '{0}'")]
    UnsupportedLocale(String),

    /// グリッドが不正
    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

/// 単語が却下された理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// 最小文字数に満たない
    TooShort,
    /// 盤面上に隣接パスが存在しない
    NotOnBoard,
    /// 辞書に存在せず、裁定にも回せない
    NotInDictionary,
    /// 既にルーム内の誰かが獲得済み
    DuplicateWord,
    /// 外部裁定で却下された
    ArbitrationRejected,
    /// ラウンドが進行中ではない
    RoundNotActive,
}

impl RejectReason {
    /// 却下理由がコンボをリセットするかどうか
    ///
    /// 盤面上に存在しない単語と辞書にない単語はリセット、重複はリセットしない。
    pub fn resets_combo(self) -> bool {
        matches!(
            self,
            RejectReason::TooShort | RejectReason::NotOnBoard | RejectReason::NotInDictionary
        )
    }
}

/// ゲーム操作のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    /// 単語検証で却下された
    #[error("word rejected: {0:?}")]
    ValidationRejected(RejectReason),

    /// 既に獲得済みの単語
    #[error("word has already been found in this room")]
    DuplicateWord,

    /// レート制限に達した
    #[error("too many {0:?} events, try again shortly")]
    RateLimited(EventKind),

    /// 現在のフェーズでは許可されていない遷移
    #[error("cannot {action:?} while room is {from:?}")]
    InvalidTransition { from: RoomPhase, action: PhaseAction },

    /// 共有ストアが利用不可（サーキットオープン）
    #[error("shared store is unavailable")]
    StoreUnavailable,

    /// 分散ロックの取得に失敗
    #[error("could not acquire lock, try again")]
    LockTimeout,

    /// ルームが存在しない
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    /// ルームが満員
    #[error("room is full")]
    RoomFull,

    /// オーナーのみが実行できる操作
    #[error("only the room owner can do that")]
    NotOwner,

    /// ルームに参加していない
    #[error("you are not a member of this room")]
    NotInRoom,

    /// 入力が不正
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl GameError {
    /// クライアントに通知する安定したエラーコード
    pub fn code(&self) -> &'static str {
        match self {
            GameError::ValidationRejected(_) => "validationRejected",
            GameError::DuplicateWord => "duplicateWord",
            GameError::RateLimited(_) => "rateLimited",
            GameError::InvalidTransition { .. } => "invalidTransition",
            GameError::StoreUnavailable => "storeUnavailable",
            GameError::LockTimeout => "tryAgain",
            GameError::RoomNotFound(_) => "roomNotFound",
            GameError::RoomFull => "roomFull",
            GameError::NotOwner => "notOwner",
            GameError::NotInRoom => "notInRoom",
            GameError::InvalidInput(_) => "invalidInput",
        }
    }
}

impl From<ValueObjectError> for GameError {
    fn from(err: ValueObjectError) -> Self {
        GameError::InvalidInput(err.to_string())
    }
}

/// 共有ストアのエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// サーキットブレーカーがオープン（ネットワークには触れていない）
    #[error("store unavailable: circuit open")]
    Unavailable,

    /// 呼び出しがタイムアウトした
    #[error("store call timed out")]
    Timeout,

    /// バックエンドのエラー
    #[error("store backend error: {0}")]
    Backend(String),
}

/// メッセージ送信のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagePushError {
    /// クライアントが見つからない
    #[error("client '{0}' not found")]
    ClientNotFound(String),

    /// 同じ ID のクライアントが既に接続している
    #[error("client '{0}' is already connected")]
    AlreadyConnected(String),

    /// 送信失敗
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// 外部裁定サービスのエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// 裁定サービスに到達できない
    #[error("arbitration oracle unavailable: {0}")]
    Unavailable(String),

    /// 応答がタイムアウトした
    #[error("arbitration oracle timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_combo_policy() {
        // テスト項目: 重複はコンボをリセットせず、盤面外の単語はリセットする
        // given (前提条件):
        let duplicate = RejectReason::DuplicateWord;
        let not_on_board = RejectReason::NotOnBoard;

        // when (操作):
        let duplicate_resets = duplicate.resets_combo();
        let not_on_board_resets = not_on_board.resets_combo();

        // then (期待する結果):
        assert!(!duplicate_resets);
        assert!(not_on_board_resets);
        assert!(!RejectReason::ArbitrationRejected.resets_combo());
    }

    #[test]
    fn test_game_error_codes_are_stable() {
        // テスト項目: エラーコードがクライアント向けの安定した文字列になる
        // given (前提条件):
        let transition = GameError::InvalidTransition {
            from: RoomPhase::Waiting,
            action: PhaseAction::End,
        };

        // when (操作):
        let code = transition.code();

        // then (期待する結果):
        assert_eq!(code, "invalidTransition");
        assert_eq!(GameError::LockTimeout.code(), "tryAgain");
        assert_eq!(GameError::RateLimited(EventKind::Chat).code(), "rateLimited");
    }
}
