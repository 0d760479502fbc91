//! Shared store service handlers.
//!
//! Each handler forwards to the backing `SharedStore`; backend failures
//! surface as `503 Service Unavailable`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast;

use crate::{
    domain::{LockToken, StoreError},
    infrastructure::dto::store::{
        AcquireLockDto, ChannelQuery, KeyQuery, KeysDto, LockTokenDto, PrefixQuery, PublishDto,
        ReleaseLockDto, ReleasedDto, SetValueDto, ValueDto,
    },
    ui::state::StoreState,
};

fn unavailable(operation: &str, e: StoreError) -> StatusCode {
    tracing::warn!("Store {} failed: {}", operation, e);
    StatusCode::SERVICE_UNAVAILABLE
}

pub async fn get_value(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<ValueDto>, StatusCode> {
    let value = state
        .store
        .get(&query.key)
        .await
        .map_err(|e| unavailable("get", e))?;
    Ok(Json(ValueDto { value }))
}

pub async fn set_value(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<SetValueDto>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .set(&query.key, body.value)
        .await
        .map_err(|e| unavailable("set", e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_value(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<KeyQuery>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .delete(&query.key)
        .await
        .map_err(|e| unavailable("delete", e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_keys(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<KeysDto>, StatusCode> {
    let keys = state
        .store
        .scan(&query.prefix)
        .await
        .map_err(|e| unavailable("scan", e))?;
    Ok(Json(KeysDto { keys }))
}

pub async fn publish(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<ChannelQuery>,
    Json(body): Json<PublishDto>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .publish(&query.channel, body.payload)
        .await
        .map_err(|e| unavailable("publish", e))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn acquire_lock(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<AcquireLockDto>,
) -> Result<Json<LockTokenDto>, StatusCode> {
    let token = state
        .store
        .acquire_lock(&query.key, std::time::Duration::from_millis(body.lease_ms))
        .await
        .map_err(|e| unavailable("acquire_lock", e))?;
    Ok(Json(LockTokenDto {
        token: token.map(|t| t.as_str().to_string()),
    }))
}

pub async fn release_lock(
    State(state): State<Arc<StoreState>>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<ReleaseLockDto>,
) -> Result<Json<ReleasedDto>, StatusCode> {
    let released = state
        .store
        .release_lock(&query.key, &LockToken::new(body.token))
        .await
        .map_err(|e| unavailable("release_lock", e))?;
    Ok(Json(ReleasedDto { released }))
}

/// Streams every message published on a channel to one WebSocket subscriber.
pub async fn subscribe_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<StoreState>>,
    Query(query): Query<ChannelQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Subscribed before the handshake completes
    let rx = state
        .store
        .subscribe(&query.channel)
        .await
        .map_err(|e| unavailable("subscribe", e))?;
    tracing::debug!("Subscriber attached to '{}'", query.channel);
    Ok(ws.on_upgrade(move |socket| stream_channel(socket, query.channel, rx)))
}

async fn stream_channel(
    socket: WebSocket,
    channel: String,
    mut rx: broadcast::Receiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            published = rx.recv() => match published {
                Ok(payload) => {
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber of '{}' skipped {} messages", channel, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Subscriber detached from '{}'", channel);
}
