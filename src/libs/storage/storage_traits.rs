use crate::libs::core::models::{Conversation, Message, MessageStatus};
use crate::libs::storage::records::SyncCursor;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub trait Transactional {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

pub trait MessageStore {
    /// Messages of one conversation, oldest first.
    fn messages_for_conversation(&mut self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;
    fn load_message(&mut self, message_id: &str) -> Result<Option<Message>, StoreError>;
    fn upsert_message(&mut self, message: &Message) -> Result<(), StoreError>;
    fn upsert_messages(&mut self, messages: &[Message]) -> Result<(), StoreError>;
    fn delete_message(&mut self, message_id: &str) -> Result<bool, StoreError>;
    fn delete_messages_for_conversation(&mut self, conversation_id: &str) -> Result<usize, StoreError>;
    fn update_status(&mut self, message_id: &str, status: MessageStatus) -> Result<bool, StoreError>;
    /// Removes server-confirmed rows of a conversation that are not in `keep_ids`
    /// and were written at or before `stored_up_to`.
    fn delete_confirmed_not_in(
        &mut self,
        conversation_id: &str,
        keep_ids: &[String],
        stored_up_to: i64,
    ) -> Result<usize, StoreError>;
    fn oldest_confirmed_timestamp(&mut self, conversation_id: &str) -> Result<Option<DateTime<Utc>>, StoreError>;
    /// Highest write sequence handed out so far.
    fn stored_watermark(&mut self) -> Result<i64, StoreError>;
}

pub trait ConversationStore {
    fn ensure_conversation(&mut self, conversation_id: &str) -> Result<(), StoreError>;
    fn upsert_conversations(&mut self, conversations: &[Conversation]) -> Result<(), StoreError>;
    fn conversations(&mut self) -> Result<Vec<Conversation>, StoreError>;
    fn record_last_message(&mut self, message: &Message) -> Result<(), StoreError>;
    fn clear_unread(&mut self, conversation_id: &str) -> Result<(), StoreError>;
}

pub trait CursorStore {
    fn load_cursor(&mut self, conversation_id: &str) -> Result<Option<SyncCursor>, StoreError>;
    fn store_cursor(&mut self, cursor: &SyncCursor) -> Result<(), StoreError>;
}

pub trait SettingsStore {
    fn load_setting(&mut self, key: &str) -> Result<Option<String>, StoreError>;
    fn store_setting(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete_setting(&mut self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ConnectionPool Error: {0}")]
    ConnectionPool(#[from] r2d2::Error),
    #[error("Database has not been initialised")]
    NotInitialised,
    #[error("Initialisation Error: {0}")]
    Initialisation(String),
    #[error("Invalid status transition for {message_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        message_id: String,
        from: MessageStatus,
        to: MessageStatus,
    },
}
