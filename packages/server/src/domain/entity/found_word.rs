//! FoundWord エンティティと、ルーム単位の単語台帳

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{PlayerId, Timestamp};

/// 検証結果
///
/// 盤面上に存在する単語は辞書・裁定の結果を持ち、存在しない単語は `NotOnBoard`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationOutcome {
    NotOnBoard,
    DictionaryHit,
    DictionaryMiss,
    PendingArbitration,
    ArbitrationAccepted,
    ArbitrationRejected,
}

impl ValidationOutcome {
    /// 得点対象となる最終状態か
    pub fn is_scoreable(self) -> bool {
        matches!(
            self,
            ValidationOutcome::DictionaryHit | ValidationOutcome::ArbitrationAccepted
        )
    }

    pub fn is_pending(self) -> bool {
        self == ValidationOutcome::PendingArbitration
    }
}

/// ルーム内で提出された単語
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundWord {
    /// ルーム内で一意な提出 ID
    pub id: u64,
    /// 正規化済みの単語
    pub word: String,
    pub player: PlayerId,
    pub submitted_at: Timestamp,
    pub outcome: ValidationOutcome,
    pub points: u32,
    /// 提出時点で適用されるコンボ（裁定待ちの単語の採点に使う）
    pub captured_combo: u32,
    pub round: u32,
}

/// ルーム単位の単語台帳
///
/// 得点済みの単語集合はラウンド中に減ることはない。プレイヤーが退出しても
/// その単語は重複判定のために残る。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordLedger {
    entries: Vec<FoundWord>,
    claimed: HashSet<String>,
    next_id: u64,
}

impl WordLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既に誰かが得点した単語か
    pub fn is_claimed(&self, word: &str) -> bool {
        self.claimed.contains(word)
    }

    /// 同じプレイヤーが同じ単語を裁定待ちにしているか
    pub fn is_pending_for(&self, word: &str, player: &PlayerId) -> bool {
        self.entries
            .iter()
            .any(|e| e.outcome.is_pending() && e.word == word && &e.player == player)
    }

    /// 提出を記録して ID を返す
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        word: String,
        player: PlayerId,
        submitted_at: Timestamp,
        outcome: ValidationOutcome,
        points: u32,
        captured_combo: u32,
        round: u32,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if outcome.is_scoreable() {
            self.claimed.insert(word.clone());
        }
        self.entries.push(FoundWord {
            id,
            word,
            player,
            submitted_at,
            outcome,
            points,
            captured_combo,
            round,
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&FoundWord> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// 裁定待ちの提出を最終状態にする
    ///
    /// 裁定待ちでない提出（既に解決済み）には何もしない。
    pub fn resolve(
        &mut self,
        id: u64,
        outcome: ValidationOutcome,
        points: u32,
    ) -> Option<&FoundWord> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.outcome.is_pending())?;
        entry.outcome = outcome;
        entry.points = points;
        if outcome.is_scoreable() {
            self.claimed.insert(entry.word.clone());
        }
        Some(entry)
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.is_pending())
    }

    /// 裁定待ちの単語（重複なし、最初の提出順）
    pub fn pending_words(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|e| e.outcome.is_pending())
            .filter(|e| seen.insert(e.word.clone()))
            .map(|e| e.word.clone())
            .collect()
    }

    /// 指定した単語の裁定待ち提出 ID（提出順）
    pub fn pending_ids_for(&self, word: &str) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| e.outcome.is_pending() && e.word == word)
            .map(|e| e.id)
            .collect()
    }

    /// 裁定待ちを全て却下扱いにする（復旧時）
    pub fn reject_all_pending(&mut self) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| e.outcome.is_pending()) {
            entry.outcome = ValidationOutcome::ArbitrationRejected;
            count += 1;
        }
        count
    }

    /// プレイヤーが得点した単語
    pub fn scored_words_of(&self, player: &PlayerId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| &e.player == player && e.outcome.is_scoreable())
            .map(|e| e.word.clone())
            .collect()
    }

    /// プレイヤーの裁定待ちの単語
    pub fn pending_words_of(&self, player: &PlayerId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| &e.player == player && e.outcome.is_pending())
            .map(|e| e.word.clone())
            .collect()
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    /// 新しいラウンドのために台帳を空にする（ID は振り直さない）
    pub fn clear(&mut self) {
        self.entries.clear();
        self.claimed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s.to_string()).unwrap()
    }

    #[test]
    fn test_scored_word_is_claimed_for_everyone() {
        // テスト項目: 得点済みの単語は全プレイヤーにとって重複になる
        // given (前提条件):
        let mut ledger = WordLedger::new();

        // when (操作):
        ledger.record(
            "CAT".to_string(),
            pid("alice"),
            Timestamp::new(0),
            ValidationOutcome::DictionaryHit,
            2,
            0,
            1,
        );

        // then (期待する結果):
        assert!(ledger.is_claimed("CAT"));
        assert_eq!(ledger.scored_words_of(&pid("alice")), vec!["CAT"]);
        assert!(ledger.scored_words_of(&pid("bob")).is_empty());
    }

    #[test]
    fn test_pending_word_is_not_claimed_until_accepted() {
        // テスト項目: 裁定待ちの単語は受理されるまで獲得扱いにならない
        // given (前提条件):
        let mut ledger = WordLedger::new();
        let id = ledger.record(
            "QAT".to_string(),
            pid("alice"),
            Timestamp::new(0),
            ValidationOutcome::PendingArbitration,
            0,
            2,
            1,
        );
        assert!(!ledger.is_claimed("QAT"));
        assert!(ledger.is_pending_for("QAT", &pid("alice")));

        // when (操作):
        let resolved = ledger
            .resolve(id, ValidationOutcome::ArbitrationAccepted, 4)
            .cloned();

        // then (期待する結果):
        assert_eq!(resolved.unwrap().captured_combo, 2);
        assert!(ledger.is_claimed("QAT"));
        assert!(!ledger.has_pending());
        assert!(ledger.resolve(id, ValidationOutcome::ArbitrationRejected, 0).is_none());
    }

    #[test]
    fn test_pending_words_are_unique_and_ordered() {
        // テスト項目: 裁定待ちの単語一覧は重複なしで提出順
        // given (前提条件):
        let mut ledger = WordLedger::new();
        for (word, player) in [("ZED", "a"), ("QI", "b"), ("ZED", "b")] {
            ledger.record(
                word.to_string(),
                pid(player),
                Timestamp::new(0),
                ValidationOutcome::PendingArbitration,
                0,
                0,
                1,
            );
        }

        // when (操作):
        let words = ledger.pending_words();

        // then (期待する結果):
        assert_eq!(words, vec!["ZED", "QI"]);
        assert_eq!(ledger.pending_ids_for("ZED"), vec![0, 2]);
    }

    #[test]
    fn test_clear_keeps_ids_increasing() {
        // テスト項目: ラウンドをまたいでも提出 ID は再利用されない
        // given (前提条件):
        let mut ledger = WordLedger::new();
        let first = ledger.record(
            "CAT".to_string(),
            pid("a"),
            Timestamp::new(0),
            ValidationOutcome::DictionaryHit,
            2,
            0,
            1,
        );

        // when (操作):
        ledger.clear();
        let second = ledger.record(
            "CAT".to_string(),
            pid("a"),
            Timestamp::new(0),
            ValidationOutcome::DictionaryHit,
            2,
            0,
            2,
        );

        // then (期待する結果):
        assert!(second > first);
        assert_eq!(ledger.claimed_count(), 1);
    }
}
