//! インメモリの共有ストア実装
//!
//! 単一プロセス内で `SharedStore` の全機能（キー・バリュー、publish/subscribe、
//! リース付きロック）を提供します。`gridword-store` はこの実装をネットワーク越しに
//! 公開し、複数のゲームサーバーが `RemoteStore` から共有します。
//!
//! 購読者がいなくなったチャンネルは、次の publish / subscribe の際に取り除きます。

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, broadcast},
    time::Instant,
};
use uuid::Uuid;

use crate::domain::{LockToken, SharedStore, StoreError};

/// 購読者が取りこぼさずに保持できるメッセージ数
const CHANNEL_CAPACITY: usize = 256;

struct Lease {
    token: LockToken,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, String>>,
    locks: Mutex<HashMap<String, Lease>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

fn prune_idle_channels(channels: &mut HashMap<String, broadcast::Sender<String>>) {
    channels.retain(|_, sender| sender.receiver_count() > 0);
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<(), StoreError> {
        let mut channels = self.channels.lock().await;
        prune_idle_channels(&mut channels);
        if let Some(sender) = channels.get(channel) {
            let _ = sender.send(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError> {
        let mut channels = self.channels.lock().await;
        prune_idle_channels(&mut channels);
        let sender = channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }

    async fn acquire_lock(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, StoreError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().await;
        if locks.get(key).is_some_and(|held| held.expires_at > now) {
            return Ok(None);
        }
        let token = LockToken::new(Uuid::new_v4().to_string());
        locks.insert(
            key.to_string(),
            Lease {
                token: token.clone(),
                expires_at: now + lease,
            },
        );
        Ok(Some(token))
    }

    async fn release_lock(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        let mut locks = self.locks.lock().await;
        match locks.get(key) {
            Some(held) if &held.token == token => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
