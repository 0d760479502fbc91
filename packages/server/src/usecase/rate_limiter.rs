//! 接続ごと・イベント種別ごとのレート制限

use std::collections::HashMap;

use tokio::{sync::Mutex, time::Instant};

use crate::{
    config::RateLimitConfig,
    domain::{EventKind, GameError, PlayerId, TokenBucket},
};

/// (プレイヤー, イベント種別) ごとのトークンバケット
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<(PlayerId, EventKind), TokenBucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// トークンを 1 つ消費する。使い切っていれば `GameError::RateLimited`
    pub async fn check(&self, player: &PlayerId, kind: EventKind) -> Result<(), GameError> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((player.clone(), kind))
            .or_insert_with(|| TokenBucket::new(self.config.policy_for(kind), now));
        if bucket.try_acquire_at(now) {
            Ok(())
        } else {
            tracing::debug!("Rate limited '{}' on {}", player, kind);
            Err(GameError::RateLimited(kind))
        }
    }

    /// 切断したプレイヤーのバケットを破棄
    pub async fn forget(&self, player: &PlayerId) {
        self.buckets.lock().await.retain(|(id, _), _| id != player);
    }

    pub async fn tracked_buckets(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s.to_string()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_word_burst_is_four() {
        // テスト項目: submit-word はバースト 4 回まで許可され、5 回目は rateLimited
        // given (前提条件):
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let alice = pid("alice");

        // when (操作):
        let mut results = Vec::new();
        for _ in 0..5 {
            results.push(limiter.check(&alice, EventKind::SubmitWord).await);
        }

        // then (期待する結果):
        assert!(results[..4].iter().all(Result::is_ok));
        assert_eq!(
            results[4],
            Err(GameError::RateLimited(EventKind::SubmitWord))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_are_independent_per_kind_and_player() {
        // テスト項目: 種別やプレイヤーが違えば別のバケットになる
        // given (前提条件):
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let alice = pid("alice");
        for _ in 0..4 {
            limiter.check(&alice, EventKind::SubmitWord).await.unwrap();
        }

        // when (操作):
        let chat = limiter.check(&alice, EventKind::Chat).await;
        let bob = limiter.check(&pid("bob"), EventKind::SubmitWord).await;

        // then (期待する結果):
        assert!(chat.is_ok());
        assert!(bob.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_refill_over_time() {
        // テスト項目: 時間が経つとトークンが補充される（submit-word は毎秒 2）
        // given (前提条件):
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let alice = pid("alice");
        for _ in 0..4 {
            limiter.check(&alice, EventKind::SubmitWord).await.unwrap();
        }
        assert!(limiter.check(&alice, EventKind::SubmitWord).await.is_err());

        // when (操作):
        tokio::time::advance(Duration::from_millis(600)).await;

        // then (期待する結果):
        assert!(limiter.check(&alice, EventKind::SubmitWord).await.is_ok());
        assert!(limiter.check(&alice, EventKind::SubmitWord).await.is_err());
    }

    #[tokio::test]
    async fn test_forget_drops_player_buckets() {
        // テスト項目: 切断時にそのプレイヤーのバケットだけが破棄される
        // given (前提条件):
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.check(&pid("alice"), EventKind::Chat).await.unwrap();
        limiter.check(&pid("alice"), EventKind::Join).await.unwrap();
        limiter.check(&pid("bob"), EventKind::Chat).await.unwrap();

        // when (操作):
        limiter.forget(&pid("alice")).await;

        // then (期待する結果):
        assert_eq!(limiter.tracked_buckets().await, 1);
    }
}
