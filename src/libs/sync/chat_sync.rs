use crate::libs::api::api_traits::ChatApi;
use crate::libs::api::dto::{RemoteMessage, SendMessageRequest};
use crate::libs::core::config::ClientConfig;
use crate::libs::core::models::{Conversation, Direction, Message, MessageStatus};
use crate::libs::realtime::channel::RealtimeSink;
use crate::libs::realtime::events::{TypingEvent, UserStatus};
use crate::libs::session::session_manager::SessionManager;
use crate::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::records::SyncCursor;
use crate::libs::storage::storage_traits::{ConversationStore, CursorStore, MessageStore, StoreError};
use crate::libs::sync::SyncError;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keeps the local message cache of one user consistent with the server and the live
/// socket. All writes go through the store, so observers only ever read the store.
pub struct ChatSync<A: ChatApi, R: RealtimeSink> {
    store: Arc<SqliteStore>,
    api: Arc<A>,
    realtime: Arc<R>,
    user_id: String,
    page_size: u32,
    presence: watch::Sender<Option<UserStatus>>,
    typing: watch::Sender<Option<TypingEvent>>,
}

impl<A: ChatApi, R: RealtimeSink> ChatSync<A, R> {
    pub fn new(store: Arc<SqliteStore>, api: Arc<A>, realtime: Arc<R>, user_id: &str, page_size: u32) -> Self {
        Self {
            store,
            api,
            realtime,
            user_id: user_id.to_string(),
            page_size,
            presence: watch::Sender::new(None),
            typing: watch::Sender::new(None),
        }
    }

    /// Binds to whoever is logged in according to `session`.
    pub fn for_session(
        store: Arc<SqliteStore>,
        api: Arc<A>,
        realtime: Arc<R>,
        session: &SessionManager,
        config: &ClientConfig,
    ) -> Result<Self, SyncError> {
        let user_id = session.user_id()?.ok_or(SyncError::NotAuthenticated)?;
        Ok(Self::new(store, api, realtime, &user_id, config.history_page_size))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn realtime(&self) -> &Arc<R> {
        &self.realtime
    }

    /// Optimistic send. Blank text is a no-op and yields `Ok(None)`.
    ///
    /// A `Sending` record is written before the request goes out. On success it is swapped
    /// for the server's record in one transaction; on failure it stays behind as `Failed`
    /// with its text, and the error is returned.
    pub async fn send(&self, conversation_id: &str, text: &str) -> Result<Option<Message>, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(conversation_id, "Ignoring blank message");
            return Ok(None);
        }

        let temp_id = Uuid::now_v7().to_string();
        let pending = Message::outgoing_text(conversation_id, temp_id.clone(), text.to_string(), Utc::now());
        self.store.with_transaction(|tx| {
            tx.upsert_message(&pending)?;
            tx.record_last_message(&pending)
        })?;

        let request = SendMessageRequest::text(text, &temp_id);
        match self.api.send_message(conversation_id, &request).await {
            Ok(remote) => {
                let mut confirmed = remote.into_message(conversation_id, &self.user_id);
                confirmed.direction = Direction::Sent;
                confirmed.client_message_id.get_or_insert_with(|| temp_id.clone());
                if confirmed.status.is_local_only() {
                    confirmed.status = MessageStatus::Sent;
                }

                self.store.with_transaction(|tx| {
                    tx.delete_message(&temp_id)?;
                    merge_confirmed(tx, &mut confirmed)?;
                    Ok(())
                })?;

                info!(conversation_id, message_id = %confirmed.id, "Message sent");
                Ok(Some(confirmed))
            }
            Err(err) => {
                warn!(conversation_id, message_id = %temp_id, %err, "Message send failed");
                self.store
                    .with_transaction(|tx| tx.update_status(&temp_id, MessageStatus::Failed))?;
                Err(err.into())
            }
        }
    }

    /// Sends a `Failed` message again under a new temporary id. Anything else is left alone.
    pub async fn resend(&self, message_id: &str) -> Result<Option<Message>, SyncError> {
        let failed = self.store.with_transaction(|tx| match tx.load_message(message_id)? {
            Some(message) if message.status == MessageStatus::Failed => {
                tx.delete_message(message_id)?;
                Ok(Some(message))
            }
            _ => Ok(None),
        })?;

        let Some(failed) = failed else {
            debug!(message_id, "Nothing to resend");
            return Ok(None);
        };
        self.send(&failed.conversation_id, &failed.text).await
    }

    /// Pulls the latest page and merges it into the cache.
    ///
    /// Confirmed rows missing from the page are dropped only if they were written before
    /// the fetch started, so live arrivals and unsent messages survive. Returns the
    /// conversation as stored afterwards.
    pub async fn refresh_history(&self, conversation_id: &str) -> Result<Vec<Message>, SyncError> {
        let watermark = self.store.with_transaction(|tx| tx.stored_watermark())?;

        let page = match self.api.messages(conversation_id, self.page_size, None).await {
            Ok(page) => page,
            Err(err) => {
                warn!(conversation_id, %err, "History refresh failed");
                return Err(err.into());
            }
        };
        let mut page: Vec<Message> = page
            .into_iter()
            .map(|remote| remote.into_message(conversation_id, &self.user_id))
            .collect();
        let keep_ids: Vec<String> = page.iter().map(|message| message.id.clone()).collect();

        let messages = self.store.with_transaction(|tx| {
            let removed = tx.delete_confirmed_not_in(conversation_id, &keep_ids, watermark)?;
            for message in page.iter_mut() {
                merge_confirmed(tx, message)?;
                settle_temporary(tx, message)?;
            }

            let cursor = tx
                .load_cursor(conversation_id)?
                .unwrap_or_else(|| SyncCursor::new(conversation_id));
            tx.store_cursor(&cursor.after_refresh(&page, Utc::now()))?;

            debug!(conversation_id, fetched = page.len(), removed, "History refreshed");
            tx.messages_for_conversation(conversation_id)
        })?;

        Ok(messages)
    }

    /// Replaces the cached conversation list (previews, unread counts) with the server's.
    pub async fn refresh_conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        let remote = self
            .api
            .conversations()
            .await
            .inspect_err(|err| warn!(%err, "Conversation refresh failed"))?;
        let conversations: Vec<Conversation> = remote.into_iter().map(Conversation::from).collect();
        self.store
            .with_transaction(|tx| tx.upsert_conversations(&conversations))?;
        debug!(count = conversations.len(), "Conversations refreshed");
        Ok(conversations)
    }

    /// Fetches the page before the oldest confirmed message. Returns how many messages
    /// came back; zero means the start of the conversation was reached.
    pub async fn load_older(&self, conversation_id: &str) -> Result<usize, SyncError> {
        let before = self
            .store
            .with_transaction(|tx| tx.oldest_confirmed_timestamp(conversation_id))?;

        let page = self
            .api
            .messages(conversation_id, self.page_size, before)
            .await
            .inspect_err(|err| warn!(conversation_id, %err, "Loading older messages failed"))?;
        let mut page: Vec<Message> = page
            .into_iter()
            .map(|remote| remote.into_message(conversation_id, &self.user_id))
            .collect();

        self.store.with_transaction(|tx| {
            for message in page.iter_mut() {
                merge_confirmed(tx, message)?;
                settle_temporary(tx, message)?;
            }
            let cursor = tx
                .load_cursor(conversation_id)?
                .unwrap_or_else(|| SyncCursor::new(conversation_id));
            tx.store_cursor(&cursor.after_older_page(&page))
        })?;

        Ok(page.len())
    }

    /// Persists a `new_message` event. `active_conversation` is used when the payload
    /// does not name its conversation.
    ///
    /// An echo of our own send replaces the temporary record; a message already stored
    /// under the same id is updated rather than duplicated.
    pub fn receive_live(
        &self,
        remote: RemoteMessage,
        active_conversation: Option<&str>,
    ) -> Result<Option<Message>, SyncError> {
        let conversation_id = match remote.conversation_id.as_deref().or(active_conversation) {
            Some(conversation_id) => conversation_id.to_string(),
            None => {
                warn!(message_id = %remote.id, "Dropping live message without a conversation");
                return Ok(None);
            }
        };

        let mut message = remote.into_message(&conversation_id, &self.user_id);
        let message = self.store.with_transaction(|tx| {
            let was_echo = settle_temporary(tx, &message)?;
            let existing = merge_confirmed(tx, &mut message)?;
            if existing.is_none() && !was_echo {
                tx.record_last_message(&message)?;
            }
            Ok(message)
        })?;

        debug!(conversation_id = %message.conversation_id, message_id = %message.id, "Live message stored");
        Ok(Some(message))
    }

    /// Server-driven delivery progress. Unknown ids and repeats are ignored.
    pub fn apply_status(&self, message_id: &str, status: MessageStatus) -> Result<bool, SyncError> {
        Ok(self
            .store
            .with_transaction(|tx| tx.update_status(message_id, status))?)
    }

    pub fn apply_presence(&self, status: UserStatus) {
        self.presence.send_replace(Some(status));
    }

    pub fn apply_typing(&self, event: TypingEvent) {
        if event.user_id == self.user_id {
            return;
        }
        self.typing.send_replace(Some(event));
    }

    /// One `typing` event per call, carrying whether the field is non-empty.
    pub fn on_text_changed(&self, conversation_id: &str, text: &str) -> Result<(), SyncError> {
        self.realtime
            .emit_typing(conversation_id, &self.user_id, !text.is_empty())?;
        Ok(())
    }

    pub fn presence(&self) -> watch::Receiver<Option<UserStatus>> {
        self.presence.subscribe()
    }

    pub fn remote_typing(&self) -> watch::Receiver<Option<TypingEvent>> {
        self.typing.subscribe()
    }
}

/// Deletes the temporary record a confirmed message was sent under, if it is still there.
fn settle_temporary(tx: &mut SqliteTransaction<'_>, message: &Message) -> Result<bool, StoreError> {
    let Some(client_id) = message.client_message_id.as_deref() else {
        return Ok(false);
    };
    if client_id == message.id {
        return Ok(false);
    }

    match tx.load_message(client_id)? {
        Some(temporary) if temporary.is_local_only() => tx.delete_message(&temporary.id),
        _ => Ok(false),
    }
}

/// Upserts a server copy without rewinding the status already stored for it.
/// Returns the row it replaced.
fn merge_confirmed(tx: &mut SqliteTransaction<'_>, message: &mut Message) -> Result<Option<Message>, StoreError> {
    let existing = tx.load_message(&message.id)?;
    if let Some(existing) = &existing {
        message.status = settled_status(existing.status, message.status);
    }
    tx.upsert_message(message)?;
    Ok(existing)
}

// Statuses only move forward; a late or coalesced update never rewinds a record.
fn settled_status(existing: MessageStatus, incoming: MessageStatus) -> MessageStatus {
    if existing.is_local_only() || existing.can_transition_to(incoming) {
        incoming
    } else {
        existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_status_never_rewinds() {
        use MessageStatus::*;
        assert_eq!(settled_status(Read, Sent), Read);
        assert_eq!(settled_status(Delivered, Sent), Delivered);
        assert_eq!(settled_status(Sent, Delivered), Delivered);
        assert_eq!(settled_status(Sending, Sent), Sent);
        assert_eq!(settled_status(Failed, Delivered), Delivered);
    }
}
