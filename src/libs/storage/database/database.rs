use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::storage_traits::StoreError;

pub static DATABASE: OnceLock<Arc<SqliteStore>> = OnceLock::new();

const SCHEMA_VERSION: &str = "1";

pub(crate) fn initialize_database(path: &str) -> Result<Arc<SqliteStore>, StoreError> {
    if let Some(db) = DATABASE.get() {
        db.with_transaction(|tx| {
            tx.inner().query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })?;
        debug!("Database already initialised");
        return Ok(db.clone());
    }

    let store = Arc::new(SqliteStore::open(path)?);
    // A concurrent initialiser may have won the race; keep whichever was set first.
    let _ = DATABASE.set(store);
    let db = DATABASE.get().ok_or(StoreError::NotInitialised)?;
    info!(path, "Database initialised and ready to use");
    Ok(db.clone())
}

pub fn database() -> Result<Arc<SqliteStore>, StoreError> {
    DATABASE.get().cloned().ok_or(StoreError::NotInitialised)
}

pub fn db_migration(sqlite_transaction: &SqliteTransaction) -> Result<(), StoreError> {
    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            conversation_id TEXT PRIMARY KEY,
            display_name TEXT,
            age INTEGER,
            photo_url TEXT,
            last_message TEXT,
            last_activity TEXT,
            unread_count INTEGER NOT NULL DEFAULT 0,
            is_online INTEGER NOT NULL DEFAULT 0,
            is_verified INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),

            CHECK (is_online IN (0, 1)),
            CHECK (is_verified IN (0, 1))
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_position ON conversations(position);",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            message_id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            direction TEXT NOT NULL,
            content_kind TEXT NOT NULL,
            status TEXT NOT NULL,
            image_url TEXT,
            voice_url TEXT,
            duration TEXT,
            message_kind TEXT NOT NULL DEFAULT 'REGULAR',
            client_message_id TEXT,
            stored_seq INTEGER NOT NULL,

            FOREIGN KEY (conversation_id) REFERENCES conversations(conversation_id) ON DELETE CASCADE,

            CHECK (direction IN ('SENT', 'RECEIVED')),
            CHECK (content_kind IN ('TEXT', 'IMAGE', 'VOICE', 'VIDEO')),
            CHECK (status IN ('SENDING', 'SENT', 'DELIVERED', 'READ', 'FAILED')),
            CHECK (message_kind IN ('REGULAR', 'DATE_SEPARATOR', 'SYSTEM'))
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation_id_created_at ON messages(conversation_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_stored_seq ON messages(stored_seq);
        CREATE INDEX IF NOT EXISTS idx_messages_client_message_id ON messages(client_message_id);",
    )?;

    // Single-row counter behind `messages.stored_seq`. It only ever grows, even when
    // the newest rows are deleted.
    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS write_sequence (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            value INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO write_sequence (id, value)
            SELECT 1, COALESCE(MAX(stored_seq), 0) FROM messages;",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS sync_cursors (
            conversation_id TEXT PRIMARY KEY,
            newest_at INTEGER,
            oldest_at INTEGER,
            refreshed_at INTEGER,

            FOREIGN KEY (conversation_id) REFERENCES conversations(conversation_id) ON DELETE CASCADE
        );",
    )?;

    sqlite_transaction.inner().execute_batch(
        "CREATE TABLE IF NOT EXISTS app_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )?;

    sqlite_transaction.inner().execute(
        "INSERT OR IGNORE INTO app_settings (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
