#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pranayam_chat_lib::libs::api::api_traits::{ApiError, ChatApi, DatingApi};
use pranayam_chat_lib::libs::api::dto::{
    AuthResponse, DiscoveryQuery, LikeResponse, OtpResponse, Profile, RemoteConversation,
    RemoteMessage, SendMessageRequest, SwipeRequest, UpdateProfileRequest, UserInfo,
};
use pranayam_chat_lib::libs::core::models::{
    ContentKind, Direction, Message, MessageKind, MessageStatus,
};
use pranayam_chat_lib::libs::realtime::channel::RealtimeSink;
use pranayam_chat_lib::libs::realtime::events::OutboundEvent;
use pranayam_chat_lib::libs::realtime::RealtimeError;
use pranayam_chat_lib::libs::storage::database::storage_sqllite::SqliteStore;
use pranayam_chat_lib::libs::storage::storage_traits::{ConversationStore, MessageStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Each test gets its own database file; the directory goes away with the guard.
pub fn temp_store() -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = SqliteStore::open(dir.path().join("chat.db")).expect("Failed to open store");
    (dir, Arc::new(store))
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn remote(id: &str, text: &str, secs: i64, is_sent: bool) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        text: text.to_string(),
        timestamp: Some(at(secs)),
        is_sent: Some(is_sent),
        content_type: ContentKind::Text,
        status: MessageStatus::Sent,
        image_url: None,
        voice_url: None,
        duration: None,
        kind: MessageKind::Regular,
        conversation_id: None,
        sender_id: None,
        client_message_id: None,
    }
}

pub fn confirmed(conversation_id: &str, id: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        text: format!("text of {}", id),
        timestamp: at(secs),
        direction: Direction::Received,
        content_kind: ContentKind::Text,
        status: MessageStatus::Sent,
        image_url: None,
        voice_url: None,
        duration: None,
        kind: MessageKind::Regular,
        client_message_id: None,
    }
}

pub fn seed(store: &SqliteStore, messages: &[Message]) {
    store
        .with_transaction(|tx| tx.upsert_messages(messages))
        .expect("Failed to seed messages");
}

pub fn stored(store: &SqliteStore, conversation_id: &str) -> Vec<Message> {
    store
        .with_transaction(|tx| tx.messages_for_conversation(conversation_id))
        .expect("Failed to load messages")
}

pub fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.id.as_str()).collect()
}

pub fn listed_conversation(id: &str, name: &str) -> RemoteConversation {
    RemoteConversation {
        id: id.to_string(),
        name: name.to_string(),
        age: 27,
        photo_url: format!("https://cdn.example/{}.jpg", id),
        last_message: String::new(),
        timestamp: String::new(),
        unread_count: 0,
        is_online: false,
        is_verified: true,
    }
}

pub fn seed_conversations(store: &SqliteStore, conversations: &[RemoteConversation]) {
    let conversations: Vec<_> = conversations.iter().cloned().map(Into::into).collect();
    store
        .with_transaction(|tx| tx.upsert_conversations(&conversations))
        .expect("Failed to seed conversations");
}

type Hook = Box<dyn FnOnce() + Send>;

/// In-memory chat server. History pages are served newest first, like the real one.
#[derive(Default)]
pub struct FakeChatApi {
    pub history: Mutex<HashMap<String, Vec<RemoteMessage>>>,
    pub conversations: Mutex<Vec<RemoteConversation>>,
    pub failure: Mutex<Option<ApiError>>,
    pub sent: Mutex<Vec<(String, SendMessageRequest)>>,
    pub history_calls: AtomicUsize,
    /// Runs once, after the page is read but before it is returned.
    pub during_fetch: Mutex<Option<Hook>>,
    next_id: AtomicUsize,
}

impl FakeChatApi {
    pub fn set_history(&self, conversation_id: &str, page: Vec<RemoteMessage>) {
        self.history
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), page);
    }

    pub fn fail_with(&self, error: Option<ApiError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn on_fetch(&self, hook: impl FnOnce() + Send + 'static) {
        *self.during_fetch.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), ApiError> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn conversations(&self) -> Result<Vec<RemoteConversation>, ApiError> {
        self.check()?;
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteMessage>, ApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let mut page: Vec<RemoteMessage> = self
            .history
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| match (before, m.timestamp) {
                (Some(before), Some(ts)) => ts < before,
                _ => true,
            })
            .collect();
        page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.truncate(limit as usize);

        let hook = self.during_fetch.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(page)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<RemoteMessage, ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), request.clone()));
        self.check()?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteMessage {
            id: format!("srv-{}", n),
            text: request.text.clone(),
            timestamp: Some(Utc::now()),
            is_sent: Some(true),
            content_type: request.kind,
            status: MessageStatus::Sent,
            image_url: None,
            voice_url: None,
            duration: None,
            kind: MessageKind::Regular,
            conversation_id: Some(conversation_id.to_string()),
            sender_id: None,
            client_message_id: request.client_message_id.clone(),
        })
    }
}

/// Records every outbound socket event instead of writing it anywhere.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<OutboundEvent>>,
    pub disconnected: AtomicBool,
}

impl RecordingSink {
    pub fn typing_flags(&self) -> Vec<bool> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                OutboundEvent::Typing(typing) => Some(typing.is_typing),
                _ => None,
            })
            .collect()
    }
}

impl RealtimeSink for RecordingSink {
    fn emit(&self, event: OutboundEvent) -> Result<(), RealtimeError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(RealtimeError::Closed);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

pub struct FakeDatingApi {
    pub otp_kind: String,
    pub user_name: String,
    pub is_match: bool,
    pub verify_calls: AtomicUsize,
    pub discovery_queries: Mutex<Vec<DiscoveryQuery>>,
    pub swipes: Mutex<Vec<SwipeRequest>>,
}

impl FakeDatingApi {
    pub fn new(otp_kind: &str, user_name: &str) -> Self {
        Self {
            otp_kind: otp_kind.to_string(),
            user_name: user_name.to_string(),
            is_match: true,
            verify_calls: AtomicUsize::new(0),
            discovery_queries: Mutex::new(Vec::new()),
            swipes: Mutex::new(Vec::new()),
        }
    }
}

pub fn profile(id: &str) -> Profile {
    Profile {
        id: id.to_string(),
        name: "Asha".to_string(),
        age: 26,
        photos: vec![],
        video_url: None,
        profession: "Architect".to_string(),
        distance: 4,
        is_verified: true,
        has_video: false,
        prompts: vec![],
        bio: None,
        height: None,
        education: None,
        languages: vec![],
    }
}

#[async_trait]
impl DatingApi for FakeDatingApi {
    async fn send_otp(&self, _phone_number: &str) -> Result<OtpResponse, ApiError> {
        Ok(OtpResponse {
            kind: self.otp_kind.clone(),
            message: if self.otp_kind == "success" {
                "OTP sent".to_string()
            } else {
                "Too many attempts".to_string()
            },
        })
    }

    async fn verify_otp(&self, phone_number: &str, _otp: &str) -> Result<AuthResponse, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthResponse {
            access_token: "token-123".to_string(),
            user: UserInfo {
                id: "user-42".to_string(),
                name: self.user_name.clone(),
                phone_number: phone_number.to_string(),
            },
        })
    }

    async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        let mut updated = profile("user-42");
        if let Some(name) = &request.name {
            updated.name = name.clone();
        }
        Ok(updated)
    }

    async fn discovery(&self, query: &DiscoveryQuery) -> Result<Vec<Profile>, ApiError> {
        self.discovery_queries.lock().unwrap().push(query.clone());
        Ok(vec![profile("p1"), profile("p2")])
    }

    async fn swipe(&self, request: &SwipeRequest) -> Result<LikeResponse, ApiError> {
        self.swipes.lock().unwrap().push(request.clone());
        Ok(LikeResponse {
            is_match: self.is_match,
            conversation_id: self.is_match.then(|| format!("conv-{}", request.target_id)),
            match_profile: self.is_match.then(|| profile(&request.target_id)),
        })
    }
}
