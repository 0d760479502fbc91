//! ネットワーク越しの共有ストアクライアント
//!
//! `gridword-store` の HTTP API（キー・バリュー、リース付きロック、publish）と
//! WebSocket（subscribe）を使い、複数のゲームサーバーが同じストアを共有します。
//! 購読は 1 チャンネルにつき 1 本の WebSocket で、受信したメッセージを
//! ローカルの broadcast チャンネルへ流します。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    domain::{LockToken, SharedStore, StoreError},
    infrastructure::dto::store::{
        AcquireLockDto, ChannelQuery, KeyQuery, KeysDto, LockTokenDto, PrefixQuery, PublishDto,
        ReleaseLockDto, ReleasedDto, SetValueDto, ValueDto,
    },
};

/// 購読者が取りこぼさずに保持できるメッセージ数
const CHANNEL_CAPACITY: usize = 256;

pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn subscribe_url(&self, channel: &str) -> Result<String, StoreError> {
        let mut url = Url::parse(&self.endpoint("/store/subscribe"))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| StoreError::Backend("unsupported store URL scheme".to_string()))?;
        url.query_pairs_mut().append_pair("channel", channel);
        Ok(url.into())
    }
}

fn request_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Backend(e.to_string())
    }
}

fn expect_success(response: Response) -> Result<(), StoreError> {
    response.error_for_status().map(|_| ()).map_err(request_error)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .error_for_status()
        .map_err(request_error)?
        .json()
        .await
        .map_err(request_error)
}

#[async_trait]
impl SharedStore for RemoteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let response = self
            .client
            .get(self.endpoint("/store/value"))
            .query(&KeyQuery {
                key: key.to_string(),
            })
            .send()
            .await
            .map_err(request_error)?;
        let body: ValueDto = read_json(response).await?;
        Ok(body.value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.endpoint("/store/value"))
            .query(&KeyQuery {
                key: key.to_string(),
            })
            .json(&SetValueDto { value })
            .send()
            .await
            .map_err(request_error)?;
        expect_success(response)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.endpoint("/store/value"))
            .query(&KeyQuery {
                key: key.to_string(),
            })
            .send()
            .await
            .map_err(request_error)?;
        expect_success(response)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .get(self.endpoint("/store/keys"))
            .query(&PrefixQuery {
                prefix: prefix.to_string(),
            })
            .send()
            .await
            .map_err(request_error)?;
        let body: KeysDto = read_json(response).await?;
        Ok(body.keys)
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.endpoint("/store/publish"))
            .query(&ChannelQuery {
                channel: channel.to_string(),
            })
            .json(&PublishDto { payload })
            .send()
            .await
            .map_err(request_error)?;
        expect_success(response)
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError> {
        let url = self.subscribe_url(channel)?;
        let (mut socket, _) = connect_async(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        let channel = channel.to_string();
        tokio::spawn(async move {
            while let Some(frame) = socket.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        // 受信側が全員いなくなったら購読をやめる
                        if tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Subscription to '{}' failed: {}", channel, e);
                        break;
                    }
                }
            }
            tracing::debug!("Subscription to '{}' closed", channel);
        });
        Ok(rx)
    }

    async fn acquire_lock(
        &self,
        key: &str,
        lease: Duration,
    ) -> Result<Option<LockToken>, StoreError> {
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX);
        let response = self
            .client
            .post(self.endpoint("/store/lock/acquire"))
            .query(&KeyQuery {
                key: key.to_string(),
            })
            .json(&AcquireLockDto { lease_ms })
            .send()
            .await
            .map_err(request_error)?;
        let body: LockTokenDto = read_json(response).await?;
        Ok(body.token.map(LockToken::new))
    }

    async fn release_lock(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        let response = self
            .client
            .post(self.endpoint("/store/lock/release"))
            .query(&KeyQuery {
                key: key.to_string(),
            })
            .json(&ReleaseLockDto {
                token: token.as_str().to_string(),
            })
            .send()
            .await
            .map_err(request_error)?;
        let body: ReleasedDto = read_json(response).await?;
        Ok(body.released)
    }
}
