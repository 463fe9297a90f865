use crate::libs::core::models::{Conversation, Message};
use crate::libs::storage::database::database;
use crate::libs::storage::database::database::DATABASE;
use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::storage_traits::{ConversationStore, MessageStore, StoreError};
use std::sync::Arc;

pub fn init_database(path: &str) -> Result<Arc<SqliteStore>, StoreError> {
    database::initialize_database(path)
}

fn database_pool() -> Result<&'static Arc<SqliteStore>, StoreError> {
    DATABASE.get().ok_or(StoreError::NotInitialised)
}

pub fn load_messages(conversation_id: &str) -> Result<Vec<Message>, StoreError> {
    database_pool()?.with_transaction(|tx| tx.messages_for_conversation(conversation_id))
}

pub fn load_conversations() -> Result<Vec<Conversation>, StoreError> {
    database_pool()?.with_transaction(|tx| tx.conversations())
}

pub fn mark_conversation_read(conversation_id: &str) -> Result<(), StoreError> {
    database_pool()?.with_transaction(|tx| tx.clear_unread(conversation_id))
}
