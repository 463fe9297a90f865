use crate::libs::api::dto::RemoteMessage;
use crate::libs::core::config::ClientConfig;
use crate::libs::realtime::codec::{self, EnginePacket, SocketPacket, CONNECT_FRAME, DISCONNECT_FRAME, PONG_FRAME};
use crate::libs::realtime::events::{InboundEvent, OutboundEvent, OutgoingSocketMessage, TypingEvent, UserStatus};
use crate::libs::realtime::RealtimeError;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

/// Outbound side of the real-time channel, as seen by the sync logic.
pub trait RealtimeSink: Send + Sync {
    fn emit(&self, event: OutboundEvent) -> Result<(), RealtimeError>;

    /// Leaves the channel. Emits queued but not yet written are dropped.
    fn disconnect(&self);

    fn emit_typing(&self, conversation_id: &str, user_id: &str, is_typing: bool) -> Result<(), RealtimeError> {
        self.emit(OutboundEvent::Typing(TypingEvent {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
            is_typing,
        }))
    }

    fn emit_message(&self, message: OutgoingSocketMessage) -> Result<(), RealtimeError> {
        self.emit(OutboundEvent::SendMessage(message))
    }
}

/// Receivers for the three inbound event kinds. Delivery is fire-and-forget; a slow
/// receiver loses the oldest events.
pub struct LiveFeeds {
    pub messages: broadcast::Receiver<RemoteMessage>,
    pub statuses: broadcast::Receiver<UserStatus>,
    pub typing: broadcast::Receiver<TypingEvent>,
}

#[derive(Clone)]
struct EventSenders {
    messages: broadcast::Sender<RemoteMessage>,
    statuses: broadcast::Sender<UserStatus>,
    typing: broadcast::Sender<TypingEvent>,
}

impl EventSenders {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: broadcast::channel(capacity).0,
            statuses: broadcast::channel(capacity).0,
            typing: broadcast::channel(capacity).0,
        }
    }

    fn dispatch(&self, name: &str, payload: Value) {
        match InboundEvent::from_socket_event(name, payload) {
            Ok(Some(InboundEvent::NewMessage(message))) => {
                let _ = self.messages.send(message);
            }
            Ok(Some(InboundEvent::UserStatus(status))) => {
                let _ = self.statuses.send(status);
            }
            Ok(Some(InboundEvent::UserTyping(typing))) => {
                let _ = self.typing.send(typing);
            }
            Ok(None) => debug!(event = name, "Ignoring socket event"),
            Err(err) => warn!(%err, "Dropping malformed socket event"),
        }
    }
}

enum Command {
    Emit(OutboundEvent),
    Close,
}

/// One Socket.IO connection for the lifetime of a chat screen. Dropping the handle
/// tears the connection down.
pub struct SocketChannel {
    commands: mpsc::UnboundedSender<Command>,
    events: EventSenders,
    connected: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl SocketChannel {
    pub async fn connect(config: &ClientConfig, user_id: &str) -> Result<Self, RealtimeError> {
        let url = socket_endpoint(&config.socket_url, user_id)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;
        info!(user_id, "Socket transport open");
        Ok(Self::spawn(ws_stream, config.event_channel_capacity))
    }

    /// Drives an already-open websocket.
    pub fn spawn<S>(stream: S, capacity: usize) -> Self
    where
        S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin + Send + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let events = EventSenders::new(capacity);
        let (connected_tx, connected) = watch::channel(false);
        let task = tokio::spawn(run(stream, command_rx, events.clone(), connected_tx));

        Self {
            commands,
            events,
            connected,
            task,
        }
    }

    pub fn live_feeds(&self) -> LiveFeeds {
        LiveFeeds {
            messages: self.events.messages.subscribe(),
            statuses: self.events.statuses.subscribe(),
            typing: self.events.typing.subscribe(),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }
}

impl RealtimeSink for SocketChannel {
    fn emit(&self, event: OutboundEvent) -> Result<(), RealtimeError> {
        self.commands
            .send(Command::Emit(event))
            .map_err(|_| RealtimeError::Closed)
    }

    fn disconnect(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn socket_endpoint(socket_url: &str, user_id: &str) -> Result<Url, RealtimeError> {
    let mut url = Url::parse(socket_url).map_err(|e| RealtimeError::Connect(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::Connect(format!("unsupported scheme {}", other)));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::Connect(format!("cannot use scheme {}", scheme)))?;
    url.set_path("/socket.io/");
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair("userId", user_id);
    Ok(url)
}

async fn run<S>(
    stream: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: EventSenders,
    connected: watch::Sender<bool>,
) where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError> + Unpin,
{
    let (mut sink, mut frames) = stream.split();
    // Emits are held back until the server acknowledges the namespace connect.
    let mut joined = false;
    let mut held: Vec<OutboundEvent> = Vec::new();

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match codec::decode(&text) {
                    Ok(EnginePacket::Open(handshake)) => {
                        debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "Engine handshake");
                        if let Err(err) = sink.send(WsMessage::Text(CONNECT_FRAME.to_string())).await {
                            warn!(%err, "Socket namespace connect failed");
                            break;
                        }
                    }
                    Ok(EnginePacket::Ping) => {
                        if let Err(err) = sink.send(WsMessage::Text(PONG_FRAME.to_string())).await {
                            warn!(%err, "Socket pong failed");
                            break;
                        }
                    }
                    Ok(EnginePacket::Message(SocketPacket::Connect)) => {
                        joined = true;
                        connected.send_replace(true);
                        info!("Socket Connected");
                        let mut flushed = true;
                        for event in held.drain(..) {
                            if !write_event(&mut sink, &event).await {
                                flushed = false;
                                break;
                            }
                        }
                        if !flushed {
                            break;
                        }
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, payload })) => {
                        events.dispatch(&name, payload);
                    }
                    Ok(EnginePacket::Message(SocketPacket::ConnectError(reason))) => {
                        warn!(%reason, "Socket namespace connect rejected");
                        break;
                    }
                    Ok(EnginePacket::Message(SocketPacket::Disconnect)) | Ok(EnginePacket::Close) => {
                        info!("Socket closed by server");
                        break;
                    }
                    Ok(other) => debug!(?other, "Ignoring socket packet"),
                    Err(err) => debug!(%err, "Ignoring undecodable socket frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Socket transport closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "Socket read failed");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Emit(event)) if !joined => held.push(event),
                Some(Command::Emit(event)) => {
                    if !write_event(&mut sink, &event).await {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(WsMessage::Text(DISCONNECT_FRAME.to_string())).await;
                    let _ = sink.close().await;
                    info!("Socket disconnected");
                    break;
                }
            },
        }
    }

    connected.send_replace(false);
}

/// `false` once the transport is unusable. Events that fail to encode are logged and skipped.
async fn write_event<K>(sink: &mut K, event: &OutboundEvent) -> bool
where
    K: Sink<WsMessage, Error = WsError> + Unpin,
{
    let frame = match event.to_frame() {
        Ok(frame) => frame,
        Err(err) => {
            warn!(%err, event = event.name(), "Could not encode socket event");
            return true;
        }
    };
    match sink.send(WsMessage::Text(frame)).await {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, event = event.name(), "Socket emit failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_endpoint_carries_user_id() {
        let url = socket_endpoint("https://chat.pranayam.app", "user 7").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://chat.pranayam.app/socket.io/?EIO=4&transport=websocket&userId=user+7"
        );

        let url = socket_endpoint("http://localhost:3000", "u1").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.port(), Some(3000));
    }

    #[test]
    fn test_socket_endpoint_rejects_other_schemes() {
        assert!(socket_endpoint("ftp://example.com", "u1").is_err());
    }
}
