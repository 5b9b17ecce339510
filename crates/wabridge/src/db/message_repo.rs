//! Message repository: CRUD operations for the `messages` table.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};

/// Which side of the conversation sent the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// A raw message row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub whatsapp_message_id: String,
    pub conversation_id: i64,
    pub phone_number: String,
    pub direction: String,
    pub message_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_mime_type: Option<String>,
    pub media_sha256: Option<String>,
    pub media_file_size: Option<i64>,
    pub voice_duration: Option<i64>,
    pub timestamp: Option<i64>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub error_code: Option<i64>,
    pub error_title: Option<String>,
    pub media_file_id: Option<i64>,
    pub created_at: String,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            whatsapp_message_id: row.get("whatsapp_message_id")?,
            conversation_id: row.get("conversation_id")?,
            phone_number: row.get("phone_number")?,
            direction: row.get("direction")?,
            message_type: row.get("message_type")?,
            content: row.get("content")?,
            media_url: row.get("media_url")?,
            media_mime_type: row.get("media_mime_type")?,
            media_sha256: row.get("media_sha256")?,
            media_file_size: row.get("media_file_size")?,
            voice_duration: row.get("voice_duration")?,
            timestamp: row.get("timestamp")?,
            status: row.get("status")?,
            failure_reason: row.get("failure_reason")?,
            error_code: row.get("error_code")?,
            error_title: row.get("error_title")?,
            media_file_id: row.get("media_file_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields supplied when writing a new message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub whatsapp_message_id: String,
    pub conversation_id: i64,
    pub phone_number: String,
    pub direction: Direction,
    pub message_type: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub media_mime_type: Option<String>,
    pub media_sha256: Option<String>,
    pub media_file_size: Option<i64>,
    pub voice_duration: Option<i64>,
    pub timestamp: Option<i64>,
    pub status: String,
}

/// Inserts a message unless one with the same `whatsapp_message_id` exists.
///
/// Returns the new row id, or `None` when the insert was ignored.
pub fn insert_if_absent(conn: &Connection, msg: &NewMessage) -> Result<Option<i64>, DatabaseError> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO messages (whatsapp_message_id, conversation_id, phone_number,
         direction, message_type, content, media_url, media_mime_type, media_sha256,
         media_file_size, voice_duration, timestamp, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            msg.whatsapp_message_id,
            msg.conversation_id,
            msg.phone_number,
            msg.direction.as_str(),
            msg.message_type,
            msg.content,
            msg.media_url,
            msg.media_mime_type,
            msg.media_sha256,
            msg.media_file_size,
            msg.voice_duration,
            msg.timestamp,
            msg.status,
            now_rfc3339(),
        ],
    )?;

    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

/// Returns true when a message with this provider id is already stored.
pub fn exists(db: &Database, whatsapp_message_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM messages WHERE whatsapp_message_id = ?1",
                params![whatsapp_message_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    })
}

/// Finds a message by its provider id.
pub fn find_by_whatsapp_id_with(
    conn: &Connection,
    whatsapp_message_id: &str,
) -> Result<Option<MessageRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM messages WHERE whatsapp_message_id = ?1",
            params![whatsapp_message_id],
            MessageRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// See [`find_by_whatsapp_id_with`].
pub fn find_by_whatsapp_id(
    db: &Database,
    whatsapp_message_id: &str,
) -> Result<Option<MessageRow>, DatabaseError> {
    db.with_conn(|conn| find_by_whatsapp_id_with(conn, whatsapp_message_id))
}

/// Links a stored media file to a message.
pub fn set_media_file(
    db: &Database,
    message_id: i64,
    media_file_id: i64,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE messages SET media_file_id = ?2 WHERE id = ?1",
            params![message_id, media_file_id],
        )?;
        Ok(())
    })
}

/// Projects the latest delivery status onto the message row.
pub fn update_status_with(
    conn: &Connection,
    message_id: i64,
    status: &str,
    failure_reason: Option<&str>,
    error_code: Option<i64>,
    error_title: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE messages SET status = ?2, failure_reason = ?3, error_code = ?4, error_title = ?5
         WHERE id = ?1",
        params![message_id, status, failure_reason, error_code, error_title],
    )?;
    Ok(())
}

/// Counts messages with the given provider id (0 or 1).
pub fn count_by_whatsapp_id(db: &Database, whatsapp_message_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE whatsapp_message_id = ?1",
            params![whatsapp_message_id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Counts all messages.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
        Ok(count)
    })
}
