//! 単語検証パイプライン
//!
//! `受信 → 盤面チェック → 辞書チェック → (必要なら) 外部裁定` の順に検証します。
//!
//! 盤面と辞書のチェックは同期的にルームワーカー内で完結します。外部裁定は
//! 別タスクで実行し、結果はコールバック（ワーカーのコマンドキューへの送信）で
//! 返すため、ルームのイベントループが裁定を待って止まることはありません。

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::domain::{
    ArbitrationOracle, Dictionary, Locale, PlayerId, RejectReason, Verdict, WordLedger,
    WordValidator,
};

/// 同期チェックの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    /// 却下（理由付き）
    Rejected(RejectReason),
    /// 辞書に存在し、その場で受理できる
    DictionaryHit,
    /// 盤面上には存在するが辞書にないため裁定待ちにする
    NeedsArbitration,
}

/// 単語検証パイプライン
pub struct ValidationPipeline {
    dictionary: Arc<dyn Dictionary>,
    oracle: Option<Arc<dyn ArbitrationOracle>>,
    oracle_timeout: Duration,
    review_unknown_words: bool,
}

impl ValidationPipeline {
    pub fn new(
        dictionary: Arc<dyn Dictionary>,
        oracle: Option<Arc<dyn ArbitrationOracle>>,
        oracle_timeout: Duration,
        review_unknown_words: bool,
    ) -> Self {
        Self {
            dictionary,
            oracle,
            oracle_timeout,
            review_unknown_words,
        }
    }

    #[cfg(test)]
    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    /// 同期チェック（文字数 → 盤面 → 重複 → 辞書）
    ///
    /// `word` は正規化済みであること。
    pub fn screen(
        &self,
        validator: &WordValidator,
        ledger: &WordLedger,
        player: &PlayerId,
        word: &str,
        locale: Locale,
    ) -> Screening {
        if !validator.is_long_enough(word) {
            return Screening::Rejected(RejectReason::TooShort);
        }
        if !validator.is_on_board(word) {
            return Screening::Rejected(RejectReason::NotOnBoard);
        }
        if ledger.is_claimed(word) || ledger.is_pending_for(word, player) {
            return Screening::Rejected(RejectReason::DuplicateWord);
        }
        if self.dictionary.contains(word, locale) {
            return Screening::DictionaryHit;
        }
        if self.review_unknown_words {
            Screening::NeedsArbitration
        } else {
            Screening::Rejected(RejectReason::NotInDictionary)
        }
    }

    /// 外部裁定を別タスクで依頼する
    ///
    /// 裁定サービスが未設定なら何もせず `None`（ラウンド終了後にホストが審査する）。
    /// サービスのエラーとタイムアウトは却下として扱う。
    pub fn dispatch<F>(
        &self,
        word: String,
        locale: Locale,
        on_verdict: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Verdict) + Send + 'static,
    {
        let oracle = self.oracle.clone()?;
        let timeout = self.oracle_timeout;
        Some(tokio::spawn(async move {
            let verdict =
                match tokio::time::timeout(timeout, oracle.submit_for_review(&word, locale)).await
                {
                    Ok(Ok(verdict)) => verdict,
                    Ok(Err(e)) => {
                        tracing::warn!("Arbitration failed for '{}', rejecting: {}", word, e);
                        Verdict::Rejected
                    }
                    Err(_) => {
                        tracing::warn!("Arbitration timed out for '{}', rejecting", word);
                        Verdict::Rejected
                    }
                };
            tracing::debug!("Arbitration verdict for '{}': {:?}", word, verdict);
            on_verdict(verdict);
        }))
    }
}
