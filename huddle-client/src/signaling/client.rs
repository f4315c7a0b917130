use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, StreamExt};
use futures::{Sink, SinkExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use huddle_core::{ClientMessage, MemberName, RoomId, ServerMessage};

use crate::error::ClientError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Connection settings for the coordinator socket.
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// Initial reconnect delay; doubles per failed attempt.
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl SignalingConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(15),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

/// What the connection task reports upward.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingEvent {
    Connected,
    Disconnected,
    Message(ServerMessage),
}

/// Cloneable handle that queues outbound messages for the connection
/// task. Messages queued while the socket is down are flushed once it
/// comes back.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl SignalSender {
    pub fn new(tx: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self { tx }
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.tx.send(message).map_err(|_| ClientError::Closed)
    }
}

/// Owns the background connection task. The task reconnects forever with
/// doubling backoff, re-joins the last joined room after each reconnect
/// and requests the call roster to resynchronize.
pub struct SignalingClient {
    sender: SignalSender,
    task: JoinHandle<()>,
}

impl SignalingClient {
    /// Spawn the connection task. Returns the client handle and the
    /// stream of events coming back from the coordinator.
    pub fn connect(config: SignalingConfig) -> (Self, mpsc::Receiver<SignalingEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(connection_loop(config, event_tx, command_rx));
        (
            Self {
                sender: SignalSender::new(command_tx),
                task,
            },
            event_rx,
        )
    }

    pub fn sender(&self) -> SignalSender {
        self.sender.clone()
    }

    pub fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.sender.send(message)
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

pub(crate) async fn connection_loop(
    config: SignalingConfig,
    event_tx: mpsc::Sender<SignalingEvent>,
    command_rx: mpsc::UnboundedReceiver<ClientMessage>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let rejoin: Arc<Mutex<Option<(RoomId, MemberName)>>> = Arc::new(Mutex::new(None));
    // A message the previous socket refused, delivered ahead of the
    // queue once the next socket is up.
    let unsent: Arc<Mutex<Option<ClientMessage>>> = Arc::new(Mutex::new(None));
    let mut delay = config.reconnect_delay;

    loop {
        info!("Connecting to {}", config.url);
        match timeout(config.connect_timeout, connect_async(&config.url)).await {
            Ok(Ok((stream, _))) => {
                info!("Connected to coordinator");
                delay = config.reconnect_delay;

                let (write, mut read) = stream.split();
                let write = Arc::new(Mutex::new(write));

                if event_tx.send(SignalingEvent::Connected).await.is_err() {
                    return;
                }

                // Restore the membership lost with the previous socket,
                // then ask for the call roster to catch up on anything
                // missed while offline.
                let resume = rejoin.lock().await.clone();
                if let Some((room, name)) = resume {
                    send_message(
                        &write,
                        &ClientMessage::Join {
                            room: room.clone(),
                            name,
                        },
                    )
                    .await;
                    send_message(&write, &ClientMessage::RequestParticipants { room }).await;
                }

                let forwarder = tokio::spawn(command_forwarder(
                    Arc::clone(&command_rx),
                    Arc::clone(&write),
                    Arc::clone(&rejoin),
                    Arc::clone(&unsent),
                ));

                while let Some(result) = read.next().await {
                    match result {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(message) => {
                                    if event_tx
                                        .send(SignalingEvent::Message(message))
                                        .await
                                        .is_err()
                                    {
                                        forwarder.abort();
                                        return;
                                    }
                                }
                                Err(e) => debug!("Ignoring unrecognized message: {}", e),
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("Coordinator closed the connection");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Connection error: {}", e);
                            break;
                        }
                    }
                }

                forwarder.abort();
                if event_tx.send(SignalingEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Ok(Err(e)) => error!("Failed to connect: {}", e),
            Err(_) => error!("Connection attempt timed out"),
        }

        info!("Reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(config.max_reconnect_delay);
    }
}

/// Drains queued outbound messages into the current socket, recording
/// join state so the connection loop can re-join after a drop. A message
/// the socket refuses goes into `unsent` for the next socket instead of
/// being dropped.
async fn command_forwarder<S>(
    command_rx: Arc<Mutex<mpsc::UnboundedReceiver<ClientMessage>>>,
    write: Arc<Mutex<S>>,
    rejoin: Arc<Mutex<Option<(RoomId, MemberName)>>>,
    unsent: Arc<Mutex<Option<ClientMessage>>>,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    // Whatever the previous socket dequeued but could not deliver goes
    // out first, ahead of everything still queued behind it.
    let carried = unsent.lock().await.take();
    if let Some(message) = carried {
        if !send_message(&write, &message).await {
            *unsent.lock().await = Some(message);
            return;
        }
    }
    let mut rx = command_rx.lock().await;
    while let Some(message) = rx.recv().await {
        match &message {
            ClientMessage::Join { room, name } => {
                *rejoin.lock().await = Some((room.clone(), name.clone()));
            }
            ClientMessage::LeaveRoom => {
                *rejoin.lock().await = None;
            }
            _ => {}
        }
        if !send_message(&write, &message).await {
            // A failed Join is replayed from the rejoin slot; keep
            // everything else for the next socket.
            if !matches!(message, ClientMessage::Join { .. }) {
                *unsent.lock().await = Some(message);
            }
            break;
        }
    }
}

/// Returns false when the socket is no longer usable.
async fn send_message<S>(write: &Arc<Mutex<S>>, message: &ClientMessage) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize outbound message: {}", e);
            return true;
        }
    };
    let mut writer = write.lock().await;
    if let Err(e) = writer.send(Message::Text(json.into())).await {
        warn!("Failed to send message: {}", e);
        return false;
    }
    true
}
