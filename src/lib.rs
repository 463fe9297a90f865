pub mod libs;

use crate::libs::core::logging;
use crate::libs::ffi::models::{ChatMessage, ConversationSummary};
use crate::libs::session::session_manager::SessionManager;
use crate::libs::storage::database::database;
use crate::libs::storage::lib_sqlite_impl;
use crate::libs::storage::storage_traits::StoreError;
use thiserror::Error;

uniffi::setup_scaffolding!();

#[derive(Debug, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ClientError {
    #[error("{0}")]
    InitializationError(String),
    #[error("{0}")]
    StorageError(String),
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotInitialised | StoreError::Initialisation(_) => {
                ClientError::InitializationError(err.to_string())
            }
            _ => ClientError::StorageError(err.to_string()),
        }
    }
}

#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    logging::init_logging(filter.as_deref());
}

#[uniffi::export]
pub fn init_database(path: String) -> Result<(), ClientError> {
    lib_sqlite_impl::init_database(&path)?;
    Ok(())
}

#[uniffi::export]
pub fn load_messages(conversation_id: String) -> Result<Vec<ChatMessage>, ClientError> {
    let messages = lib_sqlite_impl::load_messages(&conversation_id)?;
    Ok(messages.into_iter().map(ChatMessage::from).collect())
}

#[uniffi::export]
pub fn load_conversations() -> Result<Vec<ConversationSummary>, ClientError> {
    let conversations = lib_sqlite_impl::load_conversations()?;
    Ok(conversations.into_iter().map(ConversationSummary::from).collect())
}

#[uniffi::export]
pub fn mark_conversation_read(conversation_id: String) -> Result<(), ClientError> {
    Ok(lib_sqlite_impl::mark_conversation_read(&conversation_id)?)
}

#[uniffi::export]
pub fn is_logged_in() -> Result<bool, ClientError> {
    Ok(SessionManager::new(database::database()?).is_logged_in()?)
}

#[uniffi::export]
pub fn logout() -> Result<(), ClientError> {
    Ok(SessionManager::new(database::database()?).logout()?)
}
