//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{GameError, PlayerId},
    infrastructure::dto::websocket::ClientMessage,
    ui::state::AppState,
    usecase::{ConnectError, PlayerAction},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub session_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let player_id = match PlayerId::new(query.session_id.clone()) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("Invalid session_id format: '{}'", query.session_id);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    // Create a channel for this session to receive events
    let (tx, rx) = mpsc::unbounded_channel();

    match state
        .connect_player_usecase
        .execute(player_id.clone(), tx)
        .await
    {
        Ok(connected_at) => {
            tracing::info!(
                "Session '{}' connected at {}",
                player_id,
                connected_at.value()
            );
            Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, player_id, rx)))
        }
        Err(ConnectError::DuplicateSession(_)) => {
            tracing::warn!(
                "Session '{}' is already connected. Rejecting connection.",
                player_id
            );
            Err(StatusCode::CONFLICT)
        }
    }
}

/// Forwards events queued for this session to its socket.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Turns one inbound text frame into a player action.
fn parse_action(text: &str) -> Result<PlayerAction, GameError> {
    let message = serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| GameError::InvalidInput(format!("malformed message: {}", e)))?;
    PlayerAction::try_from(message)
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    player_id: PlayerId,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();

    let state_clone = state.clone();
    let player_for_recv = player_id.clone();

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error from '{}': {}", player_for_recv, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received from '{}': {}", player_for_recv, text);
                    match parse_action(text.as_str()) {
                        Ok(action) => {
                            state_clone
                                .handle_action_usecase
                                .execute(&player_for_recv, action)
                                .await;
                        }
                        Err(e) => {
                            state_clone
                                .handle_action_usecase
                                .reject(&player_for_recv, e)
                                .await;
                        }
                    }
                }
                Message::Binary(_) => {
                    state_clone
                        .handle_action_usecase
                        .reject(
                            &player_for_recv,
                            GameError::InvalidInput("binary frames are not supported".into()),
                        )
                        .await;
                }
                Message::Close(_) => {
                    tracing::info!("Session '{}' requested close", player_for_recv);
                    break;
                }
                // Ping/pong is handled by the WebSocket protocol
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    match state.disconnect_player_usecase.execute(&player_id).await {
        Some(room) => tracing::info!(
            "Session '{}' disconnected, room {} notified",
            player_id,
            room
        ),
        None => tracing::info!("Session '{}' disconnected", player_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoomCode;

    #[test]
    fn test_parse_action_submit_word() {
        // テスト項目: 単語提出メッセージを操作に変換できる
        // given (前提条件):
        let text = r#"{"type":"submit-word","room":"123456","word":"cat"}"#;

        // when (操作):
        let action = parse_action(text).unwrap();

        // then (期待する結果):
        assert!(matches!(
            action,
            PlayerAction::SubmitWord { room, word }
                if room == RoomCode::parse("123456").unwrap() && word == "cat"
        ));
    }

    #[test]
    fn test_parse_action_malformed_json() {
        // テスト項目: 解釈できないメッセージは invalidInput になる
        // given (前提条件):
        let text = r#"{"type":"fly-away"}"#;

        // when (操作):
        let result = parse_action(text);

        // then (期待する結果):
        assert!(matches!(result, Err(GameError::InvalidInput(_))));
    }

    #[test]
    fn test_parse_action_bad_room_code() {
        // テスト項目: ルームコードが不正な場合も invalidInput になる
        // given (前提条件):
        let text = r#"{"type":"start","room":"12ab"}"#;

        // when (操作):
        let result = parse_action(text);

        // then (期待する結果):
        assert!(matches!(result, Err(GameError::InvalidInput(_))));
    }
}
