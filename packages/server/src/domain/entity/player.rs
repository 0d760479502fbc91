//! Player エンティティ

use serde::{Deserialize, Serialize};

use crate::domain::{DisplayName, PlayerId, Timestamp, scoring};

/// 接続状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum Presence {
    Connected,
    /// 切断済みだが猶予期間中（`deadline` までに再接続すれば復帰できる）
    GracePeriod { deadline: Timestamp },
    Evicted,
}

/// ルーム内での役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Owner,
    Participant,
}

/// ルームに参加しているプレイヤー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: DisplayName,
    pub role: Role,
    pub presence: Presence,
    pub score: u32,
    /// 連続して有効な単語を提出した回数
    pub combo: u32,
    /// 直近の有効な提出時刻
    pub last_valid_at: Option<Timestamp>,
    pub joined_at: Timestamp,
}

impl Player {
    pub fn new(id: PlayerId, name: DisplayName, role: Role, joined_at: Timestamp) -> Self {
        Self {
            id,
            name,
            role,
            presence: Presence::Connected,
            score: 0,
            combo: 0,
            last_valid_at: None,
            joined_at,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.presence == Presence::Connected
    }

    pub fn is_in_grace_period(&self) -> bool {
        matches!(self.presence, Presence::GracePeriod { .. })
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// `now` に提出された単語に適用されるコンボ
    pub fn effective_combo(&self, now: Timestamp, window_ms: u64) -> u32 {
        let elapsed = self.last_valid_at.map(|at| now.millis_since(at));
        scoring::effective_combo(self.combo, elapsed, window_ms)
    }

    /// 同期的に受理された単語を記録
    pub fn record_valid(&mut self, points: u32, effective_combo: u32, now: Timestamp) {
        self.score += points;
        self.combo = effective_combo + 1;
        self.last_valid_at = Some(now);
    }

    /// 裁定の結果あとから受理された単語を記録
    ///
    /// 得点は提出時のコンボで計算済み。現在のコンボは提出時点の続きより小さい場合だけ引き上げ、
    /// そのときはコンボ窓の起点も提出時刻まで進める。
    pub fn record_late_accept(
        &mut self,
        points: u32,
        captured_combo: u32,
        submitted_at: Timestamp,
    ) {
        self.score += points;
        if captured_combo < self.combo {
            return;
        }
        self.combo = captured_combo + 1;
        self.last_valid_at = self.last_valid_at.max(Some(submitted_at));
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
        self.last_valid_at = None;
    }

    pub fn reset_for_round(&mut self) {
        self.score = 0;
        self.reset_combo();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(
            PlayerId::new("p1".to_string()).unwrap(),
            DisplayName::new("Alice".to_string()).unwrap(),
            Role::Participant,
            Timestamp::new(0),
        )
    }

    #[test]
    fn test_combo_grows_within_window() {
        // テスト項目: ウィンドウ内で連続して有効な単語を出すとコンボが伸びる
        // given (前提条件):
        let mut p = player();
        let window = 10_000;

        // when (操作):
        let first = p.effective_combo(Timestamp::new(1_000), window);
        p.record_valid(2, first, Timestamp::new(1_000));
        let second = p.effective_combo(Timestamp::new(5_000), window);
        p.record_valid(3, second, Timestamp::new(5_000));

        // then (期待する結果):
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(p.combo, 2);
        assert_eq!(p.score, 5);
    }

    #[test]
    fn test_combo_restarts_after_window() {
        // テスト項目: ウィンドウを過ぎるとコンボは 0 から数え直す
        // given (前提条件):
        let mut p = player();
        p.record_valid(2, 0, Timestamp::new(0));
        p.record_valid(2, 1, Timestamp::new(1_000));

        // when (操作):
        let late = p.effective_combo(Timestamp::new(20_000), 10_000);

        // then (期待する結果):
        assert_eq!(p.combo, 2);
        assert_eq!(late, 0);
    }

    #[test]
    fn test_late_accept_uses_captured_combo() {
        // テスト項目: 裁定後の受理はコンボを下げず、提出時のコンボの続きまで引き上げる
        // given (前提条件):
        let mut p = player();
        p.combo = 1;

        // when (操作):
        p.record_late_accept(7, 3, Timestamp::new(5_000));

        // then (期待する結果):
        assert_eq!(p.score, 7);
        assert_eq!(p.combo, 4);
        assert_eq!(p.last_valid_at, Some(Timestamp::new(5_000)));

        p.combo = 9;
        p.record_late_accept(1, 0, Timestamp::new(9_000));
        assert_eq!(p.combo, 9);
        assert_eq!(p.last_valid_at, Some(Timestamp::new(5_000)));
    }

    #[test]
    fn test_late_accept_after_reset_keeps_combo_window() {
        // テスト項目: コンボがリセットされた後の裁定受理は、引き上げたコンボを次の単語に引き継ぐ
        // given (前提条件):
        let mut p = player();
        p.record_valid(2, 0, Timestamp::new(1_000));
        p.reset_combo();

        // when (操作):
        p.record_late_accept(6, 1, Timestamp::new(2_000));

        // then (期待する結果):
        assert_eq!(p.combo, 2);
        assert_eq!(p.effective_combo(Timestamp::new(3_000), 5_000), 2);
    }
}
