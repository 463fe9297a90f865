// Records handed to the host UI through the generated bindings.

use crate::libs::core::models::{Conversation, Message, MessageStatus};

#[derive(Clone, Copy, Hash, Eq, PartialEq, uniffi::Enum, Debug)]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl From<MessageStatus> for DeliveryStatus {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Sending => DeliveryStatus::Sending,
            MessageStatus::Sent => DeliveryStatus::Sent,
            MessageStatus::Delivered => DeliveryStatus::Delivered,
            MessageStatus::Read => DeliveryStatus::Read,
            MessageStatus::Failed => DeliveryStatus::Failed,
        }
    }
}

#[derive(Clone, PartialEq, uniffi::Record, Debug)]
pub struct ChatMessage {
    pub message_id: String,
    pub conversation_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch, UTC.
    pub created_at: i64,
    pub is_from_user: bool,
    pub content_kind: String,
    pub status: DeliveryStatus,
    pub image_url: Option<String>,
    pub voice_url: Option<String>,
    pub duration: Option<String>,
    pub message_kind: String,
}

impl From<Message> for ChatMessage {
    fn from(message: Message) -> Self {
        Self {
            created_at: message.timestamp.timestamp_millis(),
            is_from_user: message.direction.is_sent(),
            content_kind: message.content_kind.as_str().to_string(),
            status: message.status.into(),
            message_kind: message.kind.as_str().to_string(),
            message_id: message.id,
            conversation_id: message.conversation_id,
            content: message.text,
            image_url: message.image_url,
            voice_url: message.voice_url,
            duration: message.duration,
        }
    }
}

#[derive(Clone, PartialEq, uniffi::Record, Debug)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub name: String,
    pub age: u32,
    pub photo_url: String,
    pub last_message: String,
    pub last_activity: String,
    pub unread_count: u32,
    pub is_online: bool,
    pub is_verified: bool,
}

impl From<Conversation> for ConversationSummary {
    fn from(conversation: Conversation) -> Self {
        Self {
            conversation_id: conversation.id,
            name: conversation.name,
            age: conversation.age,
            photo_url: conversation.photo_url,
            last_message: conversation.last_message,
            last_activity: conversation.timestamp,
            unread_count: conversation.unread_count,
            is_online: conversation.is_online,
            is_verified: conversation.is_verified,
        }
    }
}
