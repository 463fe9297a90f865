//! Engine.IO v4 / Socket.IO v5 text framing over a websocket.
//!
//! Every websocket text frame is one Engine.IO packet: a single type digit followed by
//! its payload. Socket.IO packets ride inside Engine.IO `message` (`4`) packets and carry
//! events as a JSON array `["name", payload]`, so an event on the default namespace is
//! framed as `42["name",{...}]`.

use crate::libs::realtime::RealtimeError;
use serde::Deserialize;
use serde_json::Value;

pub const CONNECT_FRAME: &str = "40";
pub const DISCONNECT_FRAME: &str = "41";
pub const PONG_FRAME: &str = "3";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, payload: Value },
    ConnectError(String),
    /// Acks and binary packets; never used by this client.
    Unsupported(char),
}

pub fn decode(frame: &str) -> Result<EnginePacket, RealtimeError> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| RealtimeError::Protocol("empty frame".to_string()))?;
    let body = chars.as_str();

    match kind {
        '0' => {
            let handshake: Handshake = serde_json::from_str(body)
                .map_err(|e| RealtimeError::Protocol(format!("bad handshake: {}", e)))?;
            Ok(EnginePacket::Open(handshake))
        }
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket_packet(body).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(RealtimeError::Protocol(format!(
            "unknown engine packet type {:?}",
            other
        ))),
    }
}

fn decode_socket_packet(body: &str) -> Result<SocketPacket, RealtimeError> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| RealtimeError::Protocol("empty socket packet".to_string()))?;
    let rest = skip_ack_id(skip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => decode_event(rest),
        '4' => {
            let reason = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            Ok(SocketPacket::ConnectError(reason))
        }
        other => Ok(SocketPacket::Unsupported(other)),
    }
}

// "/chat,..." selects a namespace; the default namespace has no prefix.
fn skip_namespace(rest: &str) -> &str {
    if rest.starts_with('/') {
        match rest.find(',') {
            Some(index) => &rest[index + 1..],
            None => "",
        }
    } else {
        rest
    }
}

fn skip_ack_id(rest: &str) -> &str {
    rest.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(rest: &str) -> Result<SocketPacket, RealtimeError> {
    let array: Vec<Value> = serde_json::from_str(rest)
        .map_err(|e| RealtimeError::Protocol(format!("bad event body: {}", e)))?;
    let mut items = array.into_iter();

    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(RealtimeError::Protocol("event without a name".to_string())),
    };
    let payload = items.next().unwrap_or(Value::Null);

    Ok(SocketPacket::Event { name, payload })
}

pub fn encode_event(name: &str, payload: &Value) -> Result<String, RealtimeError> {
    let body = serde_json::to_string(&(name, payload))
        .map_err(|e| RealtimeError::Protocol(e.to_string()))?;
    Ok(format!("42{}", body))
}
