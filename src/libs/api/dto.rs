use crate::libs::core::models::{
    ContentKind, Conversation, Direction, Message, MessageKind, MessageStatus, SwipeKind,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// A message as the server returns it, from history pages, send responses and
/// `new_message` socket events alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_sent: Option<bool>,
    #[serde(default)]
    pub content_type: ContentKind,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub client_message_id: Option<String>,
}

/// Accepts RFC 3339 strings and epoch milliseconds. Anything else becomes `None`
/// instead of failing the whole payload.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => match DateTime::parse_from_rfc3339(&text) {
            Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
            Err(err) => {
                warn!(timestamp = %text, %err, "Ignoring unparseable message timestamp");
                None
            }
        },
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Some(other) => {
            warn!(timestamp = %other, "Ignoring unexpected message timestamp");
            None
        }
    };
    Ok(parsed)
}

impl RemoteMessage {
    /// Binds the payload to a conversation. Direction falls back to comparing the
    /// sender with the current user when the server omits `isSent`.
    pub fn into_message(self, conversation_id: &str, current_user_id: &str) -> Message {
        let direction = match (self.is_sent, self.sender_id.as_deref()) {
            (Some(is_sent), _) => Direction::from_is_sent(is_sent),
            (None, Some(sender_id)) => Direction::from_is_sent(sender_id == current_user_id),
            (None, None) => Direction::Received,
        };

        Message {
            id: self.id,
            conversation_id: conversation_id.to_string(),
            text: self.text,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            direction,
            content_kind: self.content_type,
            status: self.status,
            image_url: self.image_url,
            voice_url: self.voice_url,
            duration: self.duration,
            kind: self.kind,
            client_message_id: self.client_message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConversation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub is_verified: bool,
}

impl From<RemoteConversation> for Conversation {
    fn from(remote: RemoteConversation) -> Self {
        Self {
            id: remote.id,
            name: remote.name,
            age: remote.age,
            photo_url: remote.photo_url,
            last_message: remote.last_message,
            timestamp: remote.timestamp,
            unread_count: remote.unread_count,
            is_online: remote.is_online,
            is_verified: remote.is_verified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_message_id: Option<String>,
}

impl SendMessageRequest {
    pub fn text(text: &str, client_message_id: &str) -> Self {
        Self {
            text: text.to_string(),
            kind: ContentKind::Text,
            client_message_id: Some(client_message_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub user_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: SwipeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpResponse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserInfo,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_preference: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender_preference: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub distance: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub has_video: bool,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub is_match: bool,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub match_profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryQuery {
    pub user_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_distance_km: u32,
}
