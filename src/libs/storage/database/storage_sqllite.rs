use crate::libs::core::models::{Conversation, Direction, Message, MessageStatus};
use crate::libs::storage::database::database::db_migration;
use crate::libs::storage::feed::{MessageFeed, StoreChange};
use crate::libs::storage::records::{
    conversation_from_row, message_from_row, millis_to_datetime, SyncCursor, CONVERSATION_COLUMNS,
    MESSAGE_COLUMNS,
};
use crate::libs::storage::storage_traits::{
    ConversationStore, CursorStore, MessageStore, SettingsStore, StoreError, Transactional,
};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

const CHANGE_FEED_CAPACITY: usize = 256;
const POOL_SIZE: u32 = 4;

pub struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
    changes: Vec<StoreChange>,
}

impl<'conn> SqliteTransaction<'conn> {
    pub fn new(conn: &'conn mut PooledConnection<SqliteConnectionManager>) -> Result<Self, StoreError> {
        let tx = conn.transaction()?;
        Ok(Self {
            tx,
            changes: Vec::new(),
        })
    }

    pub fn inner(&self) -> &Transaction<'conn> {
        &self.tx
    }

    fn touch(&mut self, change: StoreChange) {
        if !self.changes.contains(&change) {
            self.changes.push(change);
        }
    }

    pub(crate) fn take_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }

    fn next_write_sequence(&mut self) -> Result<i64, StoreError> {
        let next = self.tx.query_row(
            "UPDATE write_sequence SET value = value + 1 WHERE id = 1 RETURNING value",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }
}

impl<'conn> Transactional for SqliteTransaction<'conn> {
    fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit()?)
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(self.tx.rollback()?)
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn_pool: Pool<SqliteConnectionManager>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and brings the schema up to date.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });
        let conn_pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        let store = Self { conn_pool, changes };
        store.with_transaction(|tx| db_migration(tx))?;
        Ok(store)
    }

    pub fn new_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.conn_pool.get()?)
    }

    /// Runs `work` inside one transaction. Changes are published only once it commits;
    /// an error rolls everything back.
    pub fn with_transaction<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteTransaction<'_>) -> Result<T, StoreError>,
    {
        let mut connection = self.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;
        let value = work(&mut sqlite_transaction)?;
        let changes = sqlite_transaction.take_changes();
        sqlite_transaction.commit()?;

        for change in changes {
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
        Ok(value)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn observe_messages(self: &Arc<Self>, conversation_id: &str) -> MessageFeed {
        MessageFeed::new(self.clone(), conversation_id)
    }
}

impl<'conn> MessageStore for SqliteTransaction<'conn> {
    fn messages_for_conversation(&mut self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, stored_seq ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let messages = stmt
            .query_map(params![conversation_id], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    fn load_message(&mut self, message_id: &str) -> Result<Option<Message>, StoreError> {
        let sql = format!("SELECT {} FROM messages WHERE message_id = ?1", MESSAGE_COLUMNS);
        let message = self
            .tx
            .query_row(&sql, params![message_id], message_from_row)
            .optional()?;
        Ok(message)
    }

    fn upsert_message(&mut self, message: &Message) -> Result<(), StoreError> {
        self.ensure_conversation(&message.conversation_id)?;
        let stored_seq = self.next_write_sequence()?;

        self.tx.execute(
            "INSERT INTO messages (message_id, conversation_id, body, created_at, direction, content_kind,
                status, image_url, voice_url, duration, message_kind, client_message_id, stored_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(message_id) DO UPDATE SET
                conversation_id = excluded.conversation_id,
                body = excluded.body,
                created_at = excluded.created_at,
                direction = excluded.direction,
                content_kind = excluded.content_kind,
                status = excluded.status,
                image_url = excluded.image_url,
                voice_url = excluded.voice_url,
                duration = excluded.duration,
                message_kind = excluded.message_kind,
                client_message_id = COALESCE(excluded.client_message_id, messages.client_message_id),
                stored_seq = excluded.stored_seq",
            params![
                message.id,
                message.conversation_id,
                message.text,
                message.timestamp.timestamp_millis(),
                message.direction,
                message.content_kind,
                message.status,
                message.image_url,
                message.voice_url,
                message.duration,
                message.kind,
                message.client_message_id,
                stored_seq,
            ],
        )?;

        self.touch(StoreChange::Messages(message.conversation_id.clone()));
        Ok(())
    }

    fn upsert_messages(&mut self, messages: &[Message]) -> Result<(), StoreError> {
        for message in messages {
            self.upsert_message(message)?;
        }
        Ok(())
    }

    fn delete_message(&mut self, message_id: &str) -> Result<bool, StoreError> {
        let conversation_id: Option<String> = self
            .tx
            .query_row(
                "SELECT conversation_id FROM messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(conversation_id) = conversation_id else {
            return Ok(false);
        };

        self.tx
            .execute("DELETE FROM messages WHERE message_id = ?1", params![message_id])?;
        self.touch(StoreChange::Messages(conversation_id));
        Ok(true)
    }

    fn delete_messages_for_conversation(&mut self, conversation_id: &str) -> Result<usize, StoreError> {
        let removed = self.tx.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        self.touch(StoreChange::Messages(conversation_id.to_string()));
        Ok(removed)
    }

    fn update_status(&mut self, message_id: &str, status: MessageStatus) -> Result<bool, StoreError> {
        let current: Option<(String, MessageStatus)> = self
            .tx
            .query_row(
                "SELECT conversation_id, status FROM messages WHERE message_id = ?1",
                params![message_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((conversation_id, current)) = current else {
            debug!(message_id, "Status update for unknown message ignored");
            return Ok(false);
        };

        if current == status {
            return Ok(false);
        }

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                message_id: message_id.to_string(),
                from: current,
                to: status,
            });
        }

        self.tx.execute(
            "UPDATE messages SET status = ?2 WHERE message_id = ?1",
            params![message_id, status],
        )?;
        self.touch(StoreChange::Messages(conversation_id));
        Ok(true)
    }

    fn delete_confirmed_not_in(
        &mut self,
        conversation_id: &str,
        keep_ids: &[String],
        stored_up_to: i64,
    ) -> Result<usize, StoreError> {
        let mut sql = String::from(
            "DELETE FROM messages WHERE conversation_id = ?1
                AND status NOT IN ('SENDING', 'FAILED')
                AND stored_seq <= ?2",
        );
        let mut values = vec![
            Value::Text(conversation_id.to_string()),
            Value::Integer(stored_up_to),
        ];

        if !keep_ids.is_empty() {
            let placeholders: Vec<String> = (0..keep_ids.len()).map(|i| format!("?{}", i + 3)).collect();
            sql.push_str(&format!(" AND message_id NOT IN ({})", placeholders.join(",")));
            values.extend(keep_ids.iter().map(|id| Value::Text(id.clone())));
        }

        let removed = self.tx.execute(&sql, params_from_iter(values.iter()))?;
        if removed > 0 {
            self.touch(StoreChange::Messages(conversation_id.to_string()));
        }
        Ok(removed)
    }

    fn oldest_confirmed_timestamp(&mut self, conversation_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let oldest: Option<i64> = self.tx.query_row(
            "SELECT MIN(created_at) FROM messages
             WHERE conversation_id = ?1 AND status NOT IN ('SENDING', 'FAILED')",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(oldest.map(|millis| millis_to_datetime(0, millis)).transpose()?)
    }

    fn stored_watermark(&mut self) -> Result<i64, StoreError> {
        let watermark = self.tx.query_row(
            "SELECT value FROM write_sequence WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(watermark)
    }
}

impl<'conn> ConversationStore for SqliteTransaction<'conn> {
    fn ensure_conversation(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO conversations (conversation_id, position)
             VALUES (?1, (SELECT COALESCE(MIN(position), 0) - 1 FROM conversations))",
            params![conversation_id],
        )?;
        if inserted > 0 {
            debug!(conversation_id, "Created placeholder conversation");
            self.touch(StoreChange::Conversations);
        }
        Ok(())
    }

    fn upsert_conversations(&mut self, conversations: &[Conversation]) -> Result<(), StoreError> {
        for (position, conversation) in conversations.iter().enumerate() {
            self.tx.execute(
                "INSERT INTO conversations (conversation_id, display_name, age, photo_url, last_message,
                    last_activity, unread_count, is_online, is_verified, position, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, strftime('%s', 'now'))
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    age = excluded.age,
                    photo_url = excluded.photo_url,
                    last_message = excluded.last_message,
                    last_activity = excluded.last_activity,
                    unread_count = excluded.unread_count,
                    is_online = excluded.is_online,
                    is_verified = excluded.is_verified,
                    position = excluded.position,
                    updated_at = excluded.updated_at",
                params![
                    conversation.id,
                    conversation.name,
                    conversation.age,
                    conversation.photo_url,
                    conversation.last_message,
                    conversation.timestamp,
                    conversation.unread_count,
                    conversation.is_online,
                    conversation.is_verified,
                    position as i64,
                ],
            )?;
        }
        self.touch(StoreChange::Conversations);
        Ok(())
    }

    fn conversations(&mut self) -> Result<Vec<Conversation>, StoreError> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE display_name IS NOT NULL
             ORDER BY position ASC, updated_at DESC",
            CONVERSATION_COLUMNS
        );
        let mut stmt = self.tx.prepare(&sql)?;
        let conversations = stmt
            .query_map([], conversation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conversations)
    }

    fn record_last_message(&mut self, message: &Message) -> Result<(), StoreError> {
        let unread_increment = match message.direction {
            Direction::Received => 1,
            Direction::Sent => 0,
        };
        self.tx.execute(
            "UPDATE conversations SET
                last_message = ?2,
                last_activity = ?3,
                unread_count = unread_count + ?4,
                position = (SELECT COALESCE(MIN(position), 0) - 1 FROM conversations),
                updated_at = strftime('%s', 'now')
             WHERE conversation_id = ?1",
            params![
                message.conversation_id,
                message.text,
                message.timestamp.to_rfc3339(),
                unread_increment,
            ],
        )?;
        self.touch(StoreChange::Conversations);
        Ok(())
    }

    fn clear_unread(&mut self, conversation_id: &str) -> Result<(), StoreError> {
        self.tx.execute(
            "UPDATE conversations SET unread_count = 0 WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        self.touch(StoreChange::Conversations);
        Ok(())
    }
}

impl<'conn> CursorStore for SqliteTransaction<'conn> {
    fn load_cursor(&mut self, conversation_id: &str) -> Result<Option<SyncCursor>, StoreError> {
        let row: Option<(Option<i64>, Option<i64>, Option<i64>)> = self
            .tx
            .query_row(
                "SELECT newest_at, oldest_at, refreshed_at FROM sync_cursors WHERE conversation_id = ?1",
                params![conversation_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((newest_at, oldest_at, refreshed_at)) = row else {
            return Ok(None);
        };

        let to_datetime = |index: usize, millis: Option<i64>| -> Result<Option<DateTime<Utc>>, StoreError> {
            Ok(millis.map(|m| millis_to_datetime(index, m)).transpose()?)
        };

        Ok(Some(SyncCursor {
            conversation_id: conversation_id.to_string(),
            newest_at: to_datetime(0, newest_at)?,
            oldest_at: to_datetime(1, oldest_at)?,
            refreshed_at: to_datetime(2, refreshed_at)?,
        }))
    }

    fn store_cursor(&mut self, cursor: &SyncCursor) -> Result<(), StoreError> {
        self.ensure_conversation(&cursor.conversation_id)?;
        self.tx.execute(
            "INSERT INTO sync_cursors (conversation_id, newest_at, oldest_at, refreshed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(conversation_id) DO UPDATE SET
                newest_at = excluded.newest_at,
                oldest_at = excluded.oldest_at,
                refreshed_at = excluded.refreshed_at",
            params![
                cursor.conversation_id,
                cursor.newest_at.map(|t| t.timestamp_millis()),
                cursor.oldest_at.map(|t| t.timestamp_millis()),
                cursor.refreshed_at.map(|t| t.timestamp_millis()),
            ],
        )?;
        Ok(())
    }
}

impl<'conn> SettingsStore for SqliteTransaction<'conn> {
    fn load_setting(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .tx
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn store_setting(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = strftime('%s', 'now')",
            params![key, value],
        )?;
        self.touch(StoreChange::Settings);
        Ok(())
    }

    fn delete_setting(&mut self, key: &str) -> Result<bool, StoreError> {
        let removed = self
            .tx
            .execute("DELETE FROM app_settings WHERE key = ?1", params![key])?;
        if removed > 0 {
            self.touch(StoreChange::Settings);
        }
        Ok(removed > 0)
    }
}
