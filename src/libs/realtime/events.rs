use crate::libs::api::dto::RemoteMessage;
use crate::libs::realtime::codec;
use crate::libs::realtime::RealtimeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NEW_MESSAGE: &str = "new_message";
pub const USER_STATUS: &str = "user_status";
pub const USER_TYPING: &str = "user_typing";
pub const SEND_MESSAGE: &str = "send_message";
pub const TYPING: &str = "typing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: String,
    #[serde(default)]
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingSocketMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub recipient_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage(RemoteMessage),
    UserStatus(UserStatus),
    UserTyping(TypingEvent),
}

impl InboundEvent {
    /// `Ok(None)` for events this client does not listen to.
    pub fn from_socket_event(name: &str, payload: Value) -> Result<Option<Self>, RealtimeError> {
        let event = match name {
            NEW_MESSAGE => InboundEvent::NewMessage(parse(name, payload)?),
            USER_STATUS => InboundEvent::UserStatus(parse(name, payload)?),
            USER_TYPING => InboundEvent::UserTyping(parse(name, payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn parse<T: serde::de::DeserializeOwned>(name: &str, payload: Value) -> Result<T, RealtimeError> {
    serde_json::from_value(payload)
        .map_err(|e| RealtimeError::Protocol(format!("bad {} payload: {}", name, e)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    SendMessage(OutgoingSocketMessage),
    Typing(TypingEvent),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SendMessage(_) => SEND_MESSAGE,
            OutboundEvent::Typing(_) => TYPING,
        }
    }

    pub fn to_frame(&self) -> Result<String, RealtimeError> {
        let payload = match self {
            OutboundEvent::SendMessage(message) => serde_json::to_value(message),
            OutboundEvent::Typing(typing) => serde_json::to_value(typing),
        }
        .map_err(|e| RealtimeError::Protocol(e.to_string()))?;
        codec::encode_event(self.name(), &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_events_are_ignored() {
        let event = InboundEvent::from_socket_event("match_made", json!({})).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn test_status_defaults_to_offline() {
        let event = InboundEvent::from_socket_event(USER_STATUS, json!({"userId": "u1"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::UserStatus(UserStatus {
                user_id: "u1".to_string(),
                is_online: false
            })
        );
    }

    #[test]
    fn test_live_message_with_clock_time_is_kept() {
        let payload = json!({"id": "m1", "content": "hi", "conversationId": "c1", "timestamp": "10:30 AM"});
        match InboundEvent::from_socket_event(NEW_MESSAGE, payload).unwrap() {
            Some(InboundEvent::NewMessage(remote)) => {
                assert_eq!(remote.id, "m1");
                assert!(remote.timestamp.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_typing_frame() {
        let frame = OutboundEvent::Typing(TypingEvent {
            conversation_id: "c1".to_string(),
            user_id: "me".to_string(),
            is_typing: true,
        })
        .to_frame()
        .unwrap();
        match codec::decode(&frame).unwrap() {
            codec::EnginePacket::Message(codec::SocketPacket::Event { name, payload }) => {
                assert_eq!(name, TYPING);
                assert_eq!(payload, json!({"conversationId": "c1", "userId": "me", "isTyping": true}));
            }
            other => panic!("unexpected packet {:?}", other),
        }
        assert!(frame.starts_with(r#"42["typing",{"#));
    }
}
