//! 共有ストア trait 定義
//!
//! 複数のサーバーインスタンスで共有する Key-Value ストア（publish/subscribe と
//! リース付きロックを含む）へのインターフェースです。
//!
//! ホットパスの読み書きはメモリ上のルームで完結し、ストアはレプリケーション、
//! インスタンス間のファンアウト、クラッシュ後の復旧にのみ使われます。

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::StoreError;

/// ロックの所有者を示すトークン
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// `prefix` で始まるキーの一覧
    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn publish(&self, channel: &str, payload: String) -> Result<(), StoreError>;

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError>;

    /// リース付きでロックを取得する
    ///
    /// 他の保持者がいる場合は `Ok(None)`。リースが切れたロックは取得できる。
    async fn acquire_lock(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, StoreError>;

    /// トークンが一致する場合だけロックを解放し、解放できたかを返す
    async fn release_lock(&self, key: &str, token: &LockToken) -> Result<bool, StoreError>;
}
