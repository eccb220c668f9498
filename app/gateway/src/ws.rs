//! WebSocket server -- axum upgrade handler and message loop.

use crate::{
    dispatch::Gateway,
    lobby::{Departure, Lobby},
    rooms::Rooms,
};
use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use compact_str::CompactString;
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared state available to every connection.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub lobby: Arc<Lobby>,
}

/// Build the axum router with the `/ws` endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let client_id = CompactString::new(uuid::Uuid::new_v4().to_string());
    state.lobby.register(client_id.clone(), tx.clone());
    tracing::debug!("client {client_id} connected");

    // Sender task: forward ServerMessages to the WebSocket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("failed to serialize server message: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Receiver loop: process incoming ClientMessages.
    while let Some(Ok(ws_msg)) = receiver.next().await {
        let text = match ws_msg {
            WsMessage::Text(t) => t,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                let _ = tx.send(ServerMessage::Error {
                    code: 400,
                    message: format!("invalid message: {e}"),
                });
                continue;
            }
        };

        match client_msg {
            ClientMessage::Join { room, username } => {
                match state.lobby.join(&client_id, &room, &username) {
                    Ok(users) => {
                        let _ = tx.send(ServerMessage::UsersInRoom { room, users });
                    }
                    Err(e) => {
                        let _ = tx.send(ServerMessage::JoinError {
                            message: e.to_string(),
                        });
                    }
                }
            }

            ClientMessage::Leave => {
                if let Some(departure) = state.lobby.leave(&client_id) {
                    log_departure(&state.lobby, &departure);
                }
            }

            ClientMessage::ProcessSnapshot {
                effect,
                image_data_url,
            } => {
                let Some(room) = state.lobby.group_of(&client_id) else {
                    let _ = tx.send(ServerMessage::SnapshotRejected {
                        message: "Join a room first.".to_owned(),
                    });
                    continue;
                };
                if let Err(e) = state
                    .gateway
                    .submit(
                        &client_id,
                        &room,
                        effect.as_deref(),
                        image_data_url.as_deref(),
                    )
                    .await
                {
                    tracing::debug!("rejected snapshot from {client_id}: {e}");
                    let _ = tx.send(ServerMessage::SnapshotRejected {
                        message: e.to_string(),
                    });
                }
            }

            ClientMessage::Ping => {
                let _ = tx.send(ServerMessage::Pong);
            }
        }
    }

    // Clean up.
    if let Some(departure) = state.lobby.unregister(&client_id) {
        log_departure(&state.lobby, &departure);
    }
    state.gateway.disconnect(&client_id).await;
    tracing::debug!("client {client_id} disconnected");
    drop(tx);
    let _ = send_task.await;
}

fn log_departure(lobby: &Lobby, departure: &Departure) {
    tracing::info!(
        "{} left room {}, {} room(s) open",
        departure.username,
        departure.room,
        lobby.room_count()
    );
}
