use crate::libs::core::models::{Conversation, Message};
use chrono::{DateTime, Utc};
use rusqlite::Row;

pub(crate) const MESSAGE_COLUMNS: &str = "message_id, conversation_id, body, created_at, direction, \
     content_kind, status, image_url, voice_url, duration, message_kind, client_message_id";

pub(crate) const CONVERSATION_COLUMNS: &str = "conversation_id, display_name, age, photo_url, \
     last_message, last_activity, unread_count, is_online, is_verified";

pub(crate) fn millis_to_datetime(index: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            format!("Timestamp out of range: {}", millis).into(),
        )
    })
}

/// Maps a row selected with [`MESSAGE_COLUMNS`].
pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let created_at: i64 = row.get(3)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        text: row.get(2)?,
        timestamp: millis_to_datetime(3, created_at)?,
        direction: row.get(4)?,
        content_kind: row.get(5)?,
        status: row.get(6)?,
        image_url: row.get(7)?,
        voice_url: row.get(8)?,
        duration: row.get(9)?,
        kind: row.get(10)?,
        client_message_id: row.get(11)?,
    })
}

/// Maps a row selected with [`CONVERSATION_COLUMNS`]. Stub rows have no profile data yet.
pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        age: row.get::<_, Option<u32>>(2)?.unwrap_or_default(),
        photo_url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        last_message: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        timestamp: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        unread_count: row.get(6)?,
        is_online: row.get(7)?,
        is_verified: row.get(8)?,
    })
}

/// Per-conversation history position. `newest_at` never moves backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCursor {
    pub conversation_id: String,
    pub newest_at: Option<DateTime<Utc>>,
    pub oldest_at: Option<DateTime<Utc>>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SyncCursor {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            newest_at: None,
            oldest_at: None,
            refreshed_at: None,
        }
    }

    /// The local window now starts at the oldest message of the latest page.
    pub fn after_refresh(mut self, page: &[Message], now: DateTime<Utc>) -> Self {
        let (oldest, newest) = bounds(page);
        self.newest_at = max_opt(self.newest_at, newest);
        self.oldest_at = oldest.or(self.oldest_at);
        self.refreshed_at = Some(now);
        self
    }

    /// An older page only ever extends the window backwards.
    pub fn after_older_page(mut self, page: &[Message]) -> Self {
        let (oldest, newest) = bounds(page);
        self.newest_at = max_opt(self.newest_at, newest);
        self.oldest_at = match (self.oldest_at, oldest) {
            (Some(current), Some(candidate)) => Some(current.min(candidate)),
            (current, candidate) => current.or(candidate),
        };
        self
    }
}

fn bounds(page: &[Message]) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let oldest = page.iter().map(|m| m.timestamp).min();
    let newest = page.iter().map(|m| m.timestamp).max();
    (oldest, newest)
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
