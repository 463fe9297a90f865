use crate::libs::api::api_traits::{ChatApi, DatingApi};
use crate::libs::api::dto::{DiscoveryQuery, LikeResponse, Profile, SwipeRequest};
use crate::libs::core::config::ClientConfig;
use crate::libs::core::models::{Conversation, Message, SwipeKind};
use crate::libs::session::session_manager::SessionManager;
use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::feed::MessageFeed;
use crate::libs::storage::storage_traits::{ConversationStore, MessageStore};
use crate::libs::sync::SyncError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read side of chat for the UI. Writes happen in `ChatSync`.
pub struct ChatRepository<A: ChatApi> {
    store: Arc<SqliteStore>,
    api: Arc<A>,
}

impl<A: ChatApi> ChatRepository<A> {
    pub fn new(store: Arc<SqliteStore>, api: Arc<A>) -> Self {
        Self { store, api }
    }

    /// Server list when reachable, otherwise whatever was cached last time.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        match self.api.conversations().await {
            Ok(remote) => {
                let conversations: Vec<Conversation> = remote.into_iter().map(Conversation::from).collect();
                self.store
                    .with_transaction(|tx| tx.upsert_conversations(&conversations))?;
                debug!(count = conversations.len(), "Conversations refreshed");
                Ok(conversations)
            }
            Err(err) => {
                let cached = self.store.with_transaction(|tx| tx.conversations())?;
                if cached.is_empty() {
                    return Err(err.into());
                }
                warn!(%err, cached = cached.len(), "Conversation fetch failed, serving cache");
                Ok(cached)
            }
        }
    }

    pub fn observe_messages(&self, conversation_id: &str) -> MessageFeed {
        self.store.observe_messages(conversation_id)
    }

    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, SyncError> {
        Ok(self
            .store
            .with_transaction(|tx| tx.messages_for_conversation(conversation_id))?)
    }

    pub fn mark_read(&self, conversation_id: &str) -> Result<(), SyncError> {
        Ok(self.store.with_transaction(|tx| tx.clear_unread(conversation_id))?)
    }
}

pub struct DiscoveryRepository<A: DatingApi> {
    api: Arc<A>,
    session: SessionManager,
    max_distance_km: u32,
}

impl<A: DatingApi> DiscoveryRepository<A> {
    pub fn new(api: Arc<A>, session: SessionManager, config: &ClientConfig) -> Self {
        Self {
            api,
            session,
            max_distance_km: config.discovery_distance_km,
        }
    }

    pub async fn discovery(&self, latitude: Option<f64>, longitude: Option<f64>) -> Result<Vec<Profile>, SyncError> {
        let query = DiscoveryQuery {
            user_id: self.current_user()?,
            latitude,
            longitude,
            max_distance_km: self.max_distance_km,
        };
        Ok(self.api.discovery(&query).await?)
    }

    pub async fn swipe(&self, target_id: &str, kind: SwipeKind) -> Result<LikeResponse, SyncError> {
        let request = SwipeRequest {
            user_id: self.current_user()?,
            target_id: target_id.to_string(),
            kind,
        };
        let response = self.api.swipe(&request).await?;
        if response.is_match {
            debug!(target_id, conversation_id = ?response.conversation_id, "Swipe matched");
        }
        Ok(response)
    }

    fn current_user(&self) -> Result<String, SyncError> {
        self.session.user_id()?.ok_or(SyncError::NotAuthenticated)
    }
}
