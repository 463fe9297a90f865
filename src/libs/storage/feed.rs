use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::libs::core::models::Message;
use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::storage_traits::{MessageStore, StoreError};

/// Published by the store after a transaction that touched the given data commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Messages(String),
    Conversations,
    Settings,
}

/// Live view of one conversation: yields the full message list once, then again after
/// every committed write to that conversation.
pub struct MessageFeed {
    store: Arc<SqliteStore>,
    conversation_id: String,
    changes: broadcast::Receiver<StoreChange>,
    primed: bool,
}

impl MessageFeed {
    pub(crate) fn new(store: Arc<SqliteStore>, conversation_id: &str) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            conversation_id: conversation_id.to_string(),
            changes,
            primed: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub async fn next(&mut self) -> Option<Result<Vec<Message>, StoreError>> {
        if !self.primed {
            self.primed = true;
            return Some(self.snapshot());
        }

        loop {
            match self.changes.recv().await {
                Ok(StoreChange::Messages(conversation_id)) if conversation_id == self.conversation_id => {
                    return Some(self.snapshot());
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, conversation_id = %self.conversation_id, "Message feed lagged, re-reading");
                    return Some(self.snapshot());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn snapshot(&self) -> Result<Vec<Message>, StoreError> {
        self.store
            .with_transaction(|tx| tx.messages_for_conversation(&self.conversation_id))
    }
}
