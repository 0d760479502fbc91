//! サーキットブレーカーと呼び出しごとのタイムアウトを付けた共有ストア
//!
//! 呼び出しを行う Future がキャンセルされても、ブレーカーの許可は破棄時に精算される。

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::{
    config::StoreConfig,
    domain::{LockToken, SharedStore, StoreError},
};

pub struct ResilientStore {
    inner: Arc<dyn SharedStore>,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl ResilientStore {
    pub fn new(inner: Arc<dyn SharedStore>, config: &StoreConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config.failure_threshold, config.cooldown),
            call_timeout: config.call_timeout,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    async fn guarded<T, F>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let permit = self.breaker.try_acquire()?;
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        };
        match &outcome {
            Ok(_) => permit.succeed(),
            Err(e) => {
                tracing::warn!("Store {} failed: {}", operation, e);
                permit.fail();
            }
        }
        outcome
    }
}

#[async_trait]
impl SharedStore for ResilientStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.guarded("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.guarded("set", self.inner.set(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.guarded("delete", self.inner.delete(key)).await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.guarded("scan", self.inner.scan(prefix)).await
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<(), StoreError> {
        self.guarded("publish", self.inner.publish(channel, payload))
            .await
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError> {
        self.guarded("subscribe", self.inner.subscribe(channel))
            .await
    }

    async fn acquire_lock(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, StoreError> {
        self.guarded("acquire_lock", self.inner.acquire_lock(key, lease))
            .await
    }

    async fn release_lock(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        self.guarded("release_lock", self.inner.release_lock(key, token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockSharedStore;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - ResilientStore がサーキットブレーカーとタイムアウトを正しく適用すること
    //
    // 【なぜこのテストが必要か】
    // - ストア障害時にゲームのホットパスを止めないため、オープン中は
    //   バックエンドに触れずに即座に失敗する必要がある
    //
    // 【どのようなシナリオをテストするか】
    // 1. 連続失敗でオープンし、以降はバックエンドを呼ばない
    // 2. タイムアウトは失敗として数えられる
    // 3. クールダウン後の試行の成功で復旧する
    // 4. 試行中の呼び出しがキャンセルされても、次のクールダウン後に復旧できる
    // ========================================

    fn config(failure_threshold: u32) -> StoreConfig {
        StoreConfig {
            failure_threshold,
            cooldown: Duration::from_secs(10),
            call_timeout: Duration::from_secs(2),
            ..StoreConfig::default()
        }
    }

    /// 応答を遅らせるストア
    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl SharedStore for SlowStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            tokio::time::sleep(self.delay).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: String) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn scan(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn publish(&self, _channel: &str, _payload: String) -> Result<(), StoreError> {
            Ok(())
        }

        async fn subscribe(
            &self,
            _channel: &str,
        ) -> Result<broadcast::Receiver<String>, StoreError> {
            Ok(broadcast::channel(1).1)
        }

        async fn acquire_lock(
            &self,
            _key: &str,
            _lease: Duration,
        ) -> Result<Option<LockToken>, StoreError> {
            Ok(None)
        }

        async fn release_lock(&self, _key: &str, _token: &LockToken) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_open_circuit_skips_backend() {
        // テスト項目: 連続失敗でオープンした後はバックエンドを呼ばずに失敗する
        // given (前提条件):
        let mut inner = MockSharedStore::new();
        inner
            .expect_get()
            .times(3)
            .returning(|_| Err(StoreError::Backend("connection refused".to_string())));
        let store = ResilientStore::new(Arc::new(inner), &config(3));

        // when (操作):
        for _ in 0..3 {
            assert!(matches!(
                store.get("room:123456").await,
                Err(StoreError::Backend(_))
            ));
        }
        let short_circuited = store.get("room:123456").await;

        // then (期待する結果):
        assert_eq!(short_circuited, Err(StoreError::Unavailable));
        assert_eq!(store.circuit_state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        // テスト項目: 呼び出しタイムアウトはエラーとなり、失敗として数えられる
        // given (前提条件):
        let inner = SlowStore {
            delay: Duration::from_secs(5),
        };
        let store = ResilientStore::new(Arc::new(inner), &config(1));

        // when (操作):
        let result = store.get("room:123456").await;

        // then (期待する結果):
        assert_eq!(result, Err(StoreError::Timeout));
        assert_eq!(store.circuit_state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_during_half_open_is_exclusive() {
        // テスト項目: ハーフオープン中は試行 1 つだけが通り、成功すればクローズする
        // given (前提条件):
        let inner = SlowStore {
            delay: Duration::from_millis(500),
        };
        let store = ResilientStore::new(Arc::new(inner), &config(1));
        store.breaker.try_acquire().unwrap().fail();
        tokio::time::advance(Duration::from_secs(10)).await;

        // when (操作):
        let (trial, concurrent) = tokio::join!(store.get("trial"), store.get("concurrent"));

        // then (期待する結果):
        assert_eq!(trial, Ok(None));
        assert_eq!(concurrent, Err(StoreError::Unavailable));
        assert_eq!(store.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_does_not_wedge_breaker() {
        // テスト項目: ハーフオープン中の試行がキャンセルされても、次のクールダウン後に復旧する
        // given (前提条件):
        let inner = SlowStore {
            delay: Duration::from_millis(500),
        };
        let store = ResilientStore::new(Arc::new(inner), &config(1));
        store.breaker.try_acquire().unwrap().fail();
        tokio::time::advance(Duration::from_secs(10)).await;

        // when (操作):
        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), store.get("room:123456")).await;
        let state_after_cancel = store.circuit_state();
        let during_cooldown = store.get("room:123456").await;
        tokio::time::advance(Duration::from_secs(10)).await;
        let recovered = store.get("room:123456").await;

        // then (期待する結果):
        assert!(cancelled.is_err());
        assert_eq!(state_after_cancel, CircuitState::Open);
        assert_eq!(during_cooldown, Err(StoreError::Unavailable));
        assert_eq!(recovered, Ok(None));
        assert_eq!(store.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_lock_results_pass_through() {
        // テスト項目: ロックの取得結果はそのまま返される
        // given (前提条件):
        let mut inner = MockSharedStore::new();
        inner
            .expect_acquire_lock()
            .returning(|_, _| Ok(Some(LockToken::new("token-1".to_string()))));
        inner.expect_release_lock().returning(|_, _| Ok(true));
        let store = ResilientStore::new(Arc::new(inner), &config(5));

        // when (操作):
        let token = store
            .acquire_lock("lock:room-code", Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        let released = store.release_lock("lock:room-code", &token).await;

        // then (期待する結果):
        assert_eq!(token.as_str(), "token-1");
        assert_eq!(released, Ok(true));
    }
}
