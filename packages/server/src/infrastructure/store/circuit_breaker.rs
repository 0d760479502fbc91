//! 共有ストア呼び出しを保護するサーキットブレーカー
//!
//! `failure_threshold` 回連続で失敗するまではクローズ。それ以降はオープンとなり、
//! 呼び出しは [`StoreError::Unavailable`] で即座に失敗する。`cooldown` 経過後は
//! ハーフオープンとなり、試行を 1 つだけ通してその結果でクローズか再オープンを決める。

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::domain::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// 1 回分の呼び出しの許可
///
/// 結果は [`Permit::succeed`] か [`Permit::fail`] で報告する。ハーフオープン中の試行が
/// 結果を報告しないまま破棄された場合（呼び出し側の Future がキャンセルされた場合など）は
/// 失敗として扱い、次のクールダウン後に新しい試行を通せるようにする。
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// ハーフオープン中の試行かどうか
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.settled || !self.trial {
            return;
        }
        tracing::warn!("Store trial call abandoned before completing");
        self.breaker.on_failure(true);
    }
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// 呼び出しの許可を求める
    ///
    /// オープン中、または試行が未完了のハーフオープン中は即座に失敗する。
    pub fn try_acquire(&self) -> Result<Permit<'_>, StoreError> {
        let mut inner = self.lock();
        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled = inner
                    .opened_at
                    .is_none_or(|since| since.elapsed() >= self.cooldown);
                if !cooled {
                    return Err(StoreError::Unavailable);
                }
                tracing::info!("Store circuit half-open, admitting a trial call");
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(StoreError::Unavailable);
                }
                inner.trial_in_flight = true;
                true
            }
        };
        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            tracing::info!("Store circuit closed");
            inner.state = CircuitState::Closed;
            inner.trial_in_flight = false;
            inner.opened_at = None;
            inner.consecutive_failures = 0;
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        if trial {
            tracing::warn!("Store trial call failed, circuit re-opened");
            inner.state = CircuitState::Open;
            inner.trial_in_flight = false;
            inner.opened_at = Some(Instant::now());
            return;
        }
        // オープン前に許可された呼び出しの遅れた結果は数えない
        if inner.state != CircuitState::Closed {
            return;
        }
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            tracing::warn!(
                "Store circuit opened after {} consecutive failures",
                inner.consecutive_failures
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.consecutive_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fail_times(breaker: &CircuitBreaker, times: u32) {
        for _ in 0..times {
            breaker.try_acquire().unwrap().fail();
        }
    }

    fn is_unavailable(result: Result<Permit<'_>, StoreError>) -> bool {
        matches!(result, Err(StoreError::Unavailable))
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold() {
        // テスト項目: 連続失敗がしきい値に達するとオープンになり、即座に失敗する
        // given (前提条件):
        let breaker = CircuitBreaker::new(3, Duration::from_secs(10));

        // when (操作):
        fail_times(&breaker, 2);
        let still_closed = breaker.state();
        fail_times(&breaker, 1);

        // then (期待する結果):
        assert_eq!(still_closed, CircuitState::Closed);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(is_unavailable(breaker.try_acquire()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        // テスト項目: 成功すると連続失敗のカウントがリセットされる
        // given (前提条件):
        let breaker = CircuitBreaker::new(3, Duration::from_secs(10));
        fail_times(&breaker, 2);

        // when (操作):
        breaker.try_acquire().unwrap().succeed();
        fail_times(&breaker, 2);

        // then (期待する結果):
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        // テスト項目: クールダウン後は試行を 1 つだけ通し、成功でクローズする
        // given (前提条件):
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        fail_times(&breaker, 1);

        // when (操作):
        tokio::time::advance(Duration::from_secs(9)).await;
        let too_early = is_unavailable(breaker.try_acquire());
        tokio::time::advance(Duration::from_secs(1)).await;
        let trial = breaker.try_acquire().unwrap();
        let second = is_unavailable(breaker.try_acquire());

        // then (期待する結果):
        assert!(too_early);
        assert!(trial.is_trial());
        assert!(second);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        trial.succeed();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(!breaker.try_acquire().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_trial_reopens() {
        // テスト項目: 試行が失敗すると再びオープンになり、クールダウンをやり直す
        // given (前提条件):
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        fail_times(&breaker, 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        // when (操作):
        breaker.try_acquire().unwrap().fail();

        // then (期待する結果):
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(is_unavailable(breaker.try_acquire()));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(breaker.try_acquire().unwrap().is_trial());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_reopens_and_recovers() {
        // テスト項目: 結果を報告せずに破棄された試行は失敗として扱われ、次のクールダウン後に新しい試行が通る
        // given (前提条件):
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        fail_times(&breaker, 1);
        tokio::time::advance(Duration::from_secs(10)).await;

        // when (操作):
        drop(breaker.try_acquire().unwrap());

        // then (期待する結果):
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(is_unavailable(breaker.try_acquire()));
        tokio::time::advance(Duration::from_secs(10)).await;
        let trial = breaker.try_acquire().unwrap();
        assert!(trial.is_trial());
        trial.succeed();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_regular_call_is_not_counted() {
        // テスト項目: クローズ中の通常の呼び出しが破棄されても失敗として数えない
        // given (前提条件):
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));

        // when (操作):
        drop(breaker.try_acquire().unwrap());

        // then (期待する結果):
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
