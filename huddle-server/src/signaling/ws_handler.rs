use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use huddle_core::{ClientMessage, ConnectionId, IceServerConfig, ServerMessage};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::RegistryError;
use crate::registry::RegistryHandle;
use crate::signaling::{ConnectionHandle, SignalKind};

/// Shared state behind every handler: the registry front door, the ICE
/// configuration pushed to each new connection, and the live connection
/// table (used for the health report; room state does not live here).
pub struct AppState {
    pub registry: RegistryHandle,
    pub ice_servers: Vec<IceServerConfig>,
    pub connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl AppState {
    pub fn new(registry: RegistryHandle, ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            registry,
            ice_servers,
            connections: DashMap::new(),
        }
    }
}

/// Build the coordinator router. Kept separate from `main` so tests can
/// serve it on an ephemeral port.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> String {
    format!("ok {}", state.connections.len())
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnectionId::new();
    info!("New WebSocket connection: {}", conn_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = ConnectionHandle::new(conn_id, tx);

    state.connections.insert(conn_id, conn.clone());

    // Greeting: the ICE servers this deployment wants clients to use.
    conn.send(ServerMessage::IceConfig {
        ice_servers: state.ice_servers.clone(),
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize server message: {}", e),
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let registry = state.registry.clone();
        let conn = conn.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(parsed) => {
                            if let Err(e) = dispatch(parsed, &conn, &registry).await {
                                error!("Registry is gone: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid message from {}: {}", conn.id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Runs on every exit path, including an aborted receive task; the
    // registry treats a second disconnect for the same id as a no-op.
    if let Err(e) = state.registry.disconnect(conn_id).await {
        error!("Could not queue disconnect for {}: {}", conn_id, e);
    }
    state.connections.remove(&conn_id);
    info!("WebSocket disconnected: {}", conn_id);
}

/// Map one parsed frame onto a registry command.
async fn dispatch(
    msg: ClientMessage,
    conn: &ConnectionHandle,
    registry: &RegistryHandle,
) -> Result<(), RegistryError> {
    match msg {
        ClientMessage::Join { room, name } => registry.join(room, name, conn.clone()).await,
        ClientMessage::LeaveRoom => registry.leave(conn.id).await,
        ClientMessage::JoinCall { room, name } => registry.join_call(room, name, conn.id).await,
        ClientMessage::LeaveCall { room, name } => registry.leave_call(room, name, conn.id).await,
        ClientMessage::RequestParticipants { room } => {
            registry.request_participants(room, conn.clone()).await
        }

        ClientMessage::CodeChange { room, content } => {
            registry
                .broadcast(room, conn.id, ServerMessage::ContentUpdate { content }, true)
                .await
        }
        ClientMessage::Typing { room, name } => {
            registry
                .broadcast(room, conn.id, ServerMessage::Typing { name }, true)
                .await
        }
        ClientMessage::LanguageChange { room, language } => {
            registry
                .broadcast(room, conn.id, ServerMessage::LanguageUpdate { language }, false)
                .await
        }
        ClientMessage::Draw {
            room,
            x1,
            y1,
            x2,
            y2,
            color,
            width,
            is_eraser,
        } => {
            let stroke = ServerMessage::Draw {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
                is_eraser,
            };
            registry.broadcast(room, conn.id, stroke, true).await
        }

        ClientMessage::Offer {
            room,
            payload,
            sender,
            receiver,
        } => {
            registry
                .relay(room, conn.id, SignalKind::Offer, sender, payload, receiver)
                .await
        }
        ClientMessage::Answer {
            room,
            payload,
            sender,
            receiver,
        } => {
            registry
                .relay(room, conn.id, SignalKind::Answer, sender, payload, receiver)
                .await
        }
        ClientMessage::IceCandidate {
            room,
            payload,
            sender,
            receiver,
        } => {
            registry
                .relay(
                    room,
                    conn.id,
                    SignalKind::IceCandidate,
                    sender,
                    payload,
                    receiver,
                )
                .await
        }
    }
}
