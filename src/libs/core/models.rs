use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

// Enums are stored as their upper-case wire names so the cache and the API agree.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                $name::parse(text).ok_or(FromSqlError::InvalidType)
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentKind {
    #[default]
    Text,
    Image,
    Voice,
    Video,
}

text_enum!(ContentKind {
    Text => "TEXT",
    Image => "IMAGE",
    Voice => "VOICE",
    Video => "VIDEO",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
}

text_enum!(MessageStatus {
    Sending => "SENDING",
    Sent => "SENT",
    Delivered => "DELIVERED",
    Read => "READ",
    Failed => "FAILED",
});

impl MessageStatus {
    /// Forward-only delivery lifecycle. `Failed` and `Read` are terminal.
    pub fn can_transition_to(&self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Sending, Sent) | (Sending, Failed) | (Sent, Delivered) | (Sent, Read) | (Delivered, Read)
        )
    }

    /// The record only exists on this device; the server has not confirmed it.
    pub fn is_local_only(&self) -> bool {
        matches!(self, MessageStatus::Sending | MessageStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Sent,
    Received,
}

text_enum!(Direction {
    Sent => "SENT",
    Received => "RECEIVED",
});

impl Direction {
    pub fn from_is_sent(is_sent: bool) -> Self {
        if is_sent {
            Direction::Sent
        } else {
            Direction::Received
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Direction::Sent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    #[default]
    Regular,
    DateSeparator,
    System,
}

text_enum!(MessageKind {
    Regular => "REGULAR",
    DateSeparator => "DATE_SEPARATOR",
    System => "SYSTEM",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwipeKind {
    Like,
    Pass,
    SuperLike,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub content_kind: ContentKind,
    pub status: MessageStatus,
    pub image_url: Option<String>,
    pub voice_url: Option<String>,
    pub duration: Option<String>,
    pub kind: MessageKind,
    /// Temporary id the message carried while it was being sent.
    pub client_message_id: Option<String>,
}

impl Message {
    /// A freshly composed text message waiting for the server.
    pub fn outgoing_text(
        conversation_id: &str,
        temp_id: String,
        text: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            client_message_id: Some(temp_id.clone()),
            id: temp_id,
            conversation_id: conversation_id.to_string(),
            text,
            timestamp,
            direction: Direction::Sent,
            content_kind: ContentKind::Text,
            status: MessageStatus::Sending,
            image_url: None,
            voice_url: None,
            duration: None,
            kind: MessageKind::Regular,
        }
    }

    pub fn is_local_only(&self) -> bool {
        self.status.is_local_only()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub photo_url: String,
    pub last_message: String,
    pub timestamp: String,
    pub unread_count: u32,
    pub is_online: bool,
    pub is_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle_is_forward_only() {
        assert!(MessageStatus::Sending.can_transition_to(MessageStatus::Sent));
        assert!(MessageStatus::Sending.can_transition_to(MessageStatus::Failed));
        assert!(MessageStatus::Sent.can_transition_to(MessageStatus::Delivered));
        assert!(MessageStatus::Delivered.can_transition_to(MessageStatus::Read));

        assert!(!MessageStatus::Failed.can_transition_to(MessageStatus::Sent));
        assert!(!MessageStatus::Read.can_transition_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Sent.can_transition_to(MessageStatus::Sending));
        assert!(!MessageStatus::Sent.can_transition_to(MessageStatus::Failed));
    }

    #[test]
    fn test_text_names_match_wire_names() {
        assert_eq!(MessageKind::DateSeparator.as_str(), "DATE_SEPARATOR");
        assert_eq!(
            serde_json::to_string(&MessageKind::DateSeparator).unwrap(),
            "\"DATE_SEPARATOR\""
        );
        assert_eq!(serde_json::to_string(&SwipeKind::SuperLike).unwrap(), "\"SUPERLIKE\"");
        assert_eq!(ContentKind::parse("VOICE"), Some(ContentKind::Voice));
        assert_eq!(MessageStatus::parse("sent"), None);
    }

    #[test]
    fn test_outgoing_text_keeps_temp_id_as_client_id() {
        let message = Message::outgoing_text("c1", "tmp".to_string(), "hi".to_string(), Utc::now());
        assert_eq!(message.status, MessageStatus::Sending);
        assert_eq!(message.client_message_id.as_deref(), Some("tmp"));
        assert!(message.is_local_only());
    }
}
