use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use huddle_core::{ClientMessage, MemberName, RoomId, ServerMessage, Stroke};

use crate::call::{CallEvent, CallSession, MediaStack};
use crate::error::ClientError;
use crate::peer::{MediaLinkFactory, RetryPolicy, default_ice_servers, wait_until};
use crate::signaling::{
    RelayOutlet, SignalSender, SignalingClient, SignalingConfig, SignalingEvent,
};

/// How long a typing notification stays live without a follow-up.
pub(crate) const TYPING_CLEAR_AFTER: Duration = Duration::from_millis(1500);

/// Everything the room surfaces to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Transport to the coordinator is up and the join went out.
    Connected,
    /// Transport lost. Reconnection and re-join run in the background.
    Disconnected,
    /// Member-name roster for the room, join order.
    MembershipChanged { names: Vec<MemberName> },
    /// The requested name is taken; this client is not in the room.
    NameRejected { message: String },
    ContentChanged { content: String },
    LanguageChanged { language: String },
    StrokeReceived { stroke: Stroke },
    TypingStarted { name: MemberName },
    /// The typing notification went stale without a follow-up.
    TypingStopped { name: MemberName },
    Call(CallEvent),
}

/// Settings for one room membership.
#[derive(Debug, Clone)]
pub struct RoomClientConfig {
    pub room: RoomId,
    pub name: MemberName,
    pub signaling: SignalingConfig,
    pub retry: RetryPolicy,
}

impl RoomClientConfig {
    pub fn new(
        url: impl Into<String>,
        room: impl Into<RoomId>,
        name: impl Into<MemberName>,
    ) -> Self {
        Self {
            room: room.into(),
            name: name.into(),
            signaling: SignalingConfig::new(url),
            retry: RetryPolicy::default(),
        }
    }
}

enum RoomCommand {
    SendContent(String),
    SendTyping,
    SendLanguage(String),
    SendStroke(Stroke),
    JoinCall,
    LeaveCall,
    SetMuted(bool),
    LeaveRoom,
}

/// A room membership: the coordinator connection, the background
/// dispatcher, and the channels the application talks through.
///
/// All methods queue work for the dispatcher; results come back on the
/// event stream.
pub struct RoomClient {
    commands: mpsc::UnboundedSender<RoomCommand>,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    signaling: SignalingClient,
    dispatcher: JoinHandle<()>,
}

impl RoomClient {
    /// Connect with the default media stack: silence out, discard in,
    /// WebRTC links.
    pub fn connect(config: RoomClientConfig) -> Self {
        Self::connect_with(config, MediaStack::default())
    }

    pub fn connect_with(config: RoomClientConfig, stack: MediaStack) -> Self {
        let (signaling, signal_rx) = SignalingClient::connect(config.signaling.clone());
        let sender = signaling.sender();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let outlet = Arc::new(RelayOutlet::new(
            config.room.clone(),
            config.name.clone(),
            sender.clone(),
        ));
        let factory = Arc::clone(&stack.factory);
        let call = CallSession::new(
            config.room.clone(),
            config.name.clone(),
            sender.clone(),
            outlet,
            stack,
            event_tx.clone(),
            config.retry.clone(),
        );

        let dispatcher = RoomDispatcher {
            room: config.room,
            name: config.name,
            sender,
            factory,
            call,
            typing: TypingTracker::default(),
            events: event_tx,
            signal_rx,
            command_rx,
        };
        let dispatcher = tokio::spawn(dispatcher.run());

        Self {
            commands: command_tx,
            events: event_rx,
            signaling,
            dispatcher,
        }
    }

    /// Next event from the room. Returns `None` once the client is shut
    /// down.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    pub fn send_content(&self, content: String) -> Result<(), ClientError> {
        self.command(RoomCommand::SendContent(content))
    }

    pub fn send_typing(&self) -> Result<(), ClientError> {
        self.command(RoomCommand::SendTyping)
    }

    pub fn send_language(&self, language: String) -> Result<(), ClientError> {
        self.command(RoomCommand::SendLanguage(language))
    }

    pub fn send_stroke(&self, stroke: Stroke) -> Result<(), ClientError> {
        self.command(RoomCommand::SendStroke(stroke))
    }

    /// Join the room's call. The outcome arrives on the event stream:
    /// `CallEvent::Joined`, or `CallEvent::CaptureFailed` if the
    /// microphone could not be opened.
    pub fn join_call(&self) -> Result<(), ClientError> {
        self.command(RoomCommand::JoinCall)
    }

    pub fn leave_call(&self) -> Result<(), ClientError> {
        self.command(RoomCommand::LeaveCall)
    }

    pub fn set_muted(&self, muted: bool) -> Result<(), ClientError> {
        self.command(RoomCommand::SetMuted(muted))
    }

    /// Leave the room, and the call if joined. The connection stays up.
    pub fn leave_room(&self) -> Result<(), ClientError> {
        self.command(RoomCommand::LeaveRoom)
    }

    /// Stop the dispatcher and drop the coordinator connection.
    pub fn shutdown(self) {
        self.dispatcher.abort();
        self.signaling.shutdown();
    }

    fn command(&self, command: RoomCommand) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

struct RoomDispatcher {
    room: RoomId,
    name: MemberName,
    sender: SignalSender,
    factory: Arc<dyn MediaLinkFactory>,
    call: CallSession,
    typing: TypingTracker,
    events: mpsc::UnboundedSender<RoomEvent>,
    signal_rx: mpsc::Receiver<SignalingEvent>,
    command_rx: mpsc::UnboundedReceiver<RoomCommand>,
}

impl RoomDispatcher {
    async fn run(mut self) {
        debug!("Room dispatcher for {} started", self.room);
        // Initial join; the connection task replays it after every drop.
        let _ = self.sender.send(ClientMessage::Join {
            room: self.room.clone(),
            name: self.name.clone(),
        });
        loop {
            tokio::select! {
                signal = self.signal_rx.recv() => match signal {
                    Some(signal) => self.on_signal(signal).await,
                    None => break,
                },
                command = self.command_rx.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                _ = wait_until(self.typing.deadline()) => {
                    if let Some(name) = self.typing.expire(Instant::now()) {
                        self.emit(RoomEvent::TypingStopped { name });
                    }
                }
            }
        }
        debug!("Room dispatcher for {} stopped", self.room);
    }

    async fn on_signal(&mut self, signal: SignalingEvent) {
        match signal {
            SignalingEvent::Connected => self.emit(RoomEvent::Connected),
            SignalingEvent::Disconnected => self.emit(RoomEvent::Disconnected),
            SignalingEvent::Message(message) => self.on_message(message).await,
        }
    }

    async fn on_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::IceConfig { mut ice_servers } => {
                // Keep the STUN fallback alongside whatever the
                // coordinator issued.
                for fallback in default_ice_servers() {
                    if !ice_servers.contains(&fallback) {
                        ice_servers.push(fallback);
                    }
                }
                self.factory.configure_ice(ice_servers).await;
            }
            ServerMessage::MembershipUpdate { names } => {
                self.emit(RoomEvent::MembershipChanged { names });
            }
            ServerMessage::NameTaken { message } => {
                warn!("Join rejected: {}", message);
                self.emit(RoomEvent::NameRejected { message });
            }
            ServerMessage::ContentUpdate { content } => {
                self.emit(RoomEvent::ContentChanged { content });
            }
            ServerMessage::Typing { name } => {
                self.typing.saw_typing(name.clone(), Instant::now());
                self.emit(RoomEvent::TypingStarted { name });
            }
            ServerMessage::LanguageUpdate { language } => {
                self.emit(RoomEvent::LanguageChanged { language });
            }
            ServerMessage::Draw {
                x1,
                y1,
                x2,
                y2,
                color,
                width,
                is_eraser,
            } => {
                let stroke = Stroke {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                    width,
                    is_eraser,
                };
                self.emit(RoomEvent::StrokeReceived { stroke });
            }
            ServerMessage::CallParticipantJoined { name } => {
                self.call.on_participant_joined(name).await;
            }
            ServerMessage::CallParticipantLeft { name } => {
                self.call.on_participant_left(name).await;
            }
            ServerMessage::CurrentParticipants { participants } => {
                self.call.on_current_participants(participants).await;
            }
            ServerMessage::Offer { payload, sender } => {
                self.call.on_offer(sender, payload).await;
            }
            ServerMessage::Answer { payload, sender } => {
                self.call.on_answer(sender, payload).await;
            }
            ServerMessage::IceCandidate { payload, sender } => {
                self.call.on_candidate(sender, payload).await;
            }
        }
    }

    async fn on_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::SendContent(content) => {
                let _ = self.sender.send(ClientMessage::CodeChange {
                    room: self.room.clone(),
                    content,
                });
            }
            RoomCommand::SendTyping => {
                let _ = self.sender.send(ClientMessage::Typing {
                    room: self.room.clone(),
                    name: self.name.clone(),
                });
            }
            RoomCommand::SendLanguage(language) => {
                let _ = self.sender.send(ClientMessage::LanguageChange {
                    room: self.room.clone(),
                    language,
                });
            }
            RoomCommand::SendStroke(stroke) => {
                let _ = self.sender.send(ClientMessage::draw(self.room.clone(), stroke));
            }
            RoomCommand::JoinCall => {
                if let Err(e) = self.call.join().await {
                    warn!("Call join aborted: {}", e);
                    self.emit(RoomEvent::Call(CallEvent::CaptureFailed {
                        message: e.to_string(),
                    }));
                }
            }
            RoomCommand::LeaveCall => self.call.leave().await,
            RoomCommand::SetMuted(muted) => self.call.set_muted(muted),
            RoomCommand::LeaveRoom => {
                self.call.leave().await;
                let _ = self.sender.send(ClientMessage::LeaveRoom);
            }
        }
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }
}

/// Tracks the most recent typing member and when the notification goes
/// stale.
#[derive(Debug, Default)]
struct TypingTracker {
    current: Option<MemberName>,
    deadline: Option<Instant>,
}

impl TypingTracker {
    fn saw_typing(&mut self, name: MemberName, now: Instant) {
        self.current = Some(name);
        self.deadline = Some(now + TYPING_CLEAR_AFTER);
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Clears and returns the typing member once the deadline passes.
    fn expire(&mut self, now: Instant) -> Option<MemberName> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.current.take()
            }
            _ => None,
        }
    }
}
