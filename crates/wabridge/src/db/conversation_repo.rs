//! Conversation repository: one row per customer phone number.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};

/// A raw conversation row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRow {
    pub id: i64,
    pub phone_number: String,
    pub display_name: String,
    pub profile_name: Option<String>,
    pub last_message_at: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            phone_number: row.get("phone_number")?,
            display_name: row.get("display_name")?,
            profile_name: row.get("profile_name")?,
            last_message_at: row.get("last_message_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Creates the conversation for `phone_number` or refreshes an existing one.
///
/// `display_name` is only written when a real name is known; a new row falls
/// back to the phone number. `last_message_at` never moves backwards.
pub fn upsert_with(
    conn: &Connection,
    phone_number: &str,
    display_name: Option<&str>,
    profile_name: Option<&str>,
    last_message_at: Option<i64>,
) -> Result<ConversationRow, DatabaseError> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO conversations (phone_number, display_name, profile_name, last_message_at,
         created_at, updated_at)
         VALUES (?1, COALESCE(?2, ?1), ?3, ?4, ?5, ?5)
         ON CONFLICT(phone_number) DO UPDATE SET
           display_name = COALESCE(?2, conversations.display_name),
           profile_name = COALESCE(?3, conversations.profile_name),
           last_message_at = CASE
             WHEN ?4 IS NULL THEN conversations.last_message_at
             WHEN conversations.last_message_at IS NULL OR ?4 > conversations.last_message_at THEN ?4
             ELSE conversations.last_message_at
           END,
           updated_at = ?5",
        params![phone_number, display_name, profile_name, last_message_at, now],
    )?;

    let row = conn.query_row(
        "SELECT * FROM conversations WHERE phone_number = ?1",
        params![phone_number],
        ConversationRow::from_row,
    )?;
    Ok(row)
}

/// See [`upsert_with`].
pub fn upsert(
    db: &Database,
    phone_number: &str,
    display_name: Option<&str>,
    profile_name: Option<&str>,
    last_message_at: Option<i64>,
) -> Result<ConversationRow, DatabaseError> {
    db.with_conn(|conn| {
        upsert_with(conn, phone_number, display_name, profile_name, last_message_at)
    })
}

/// Finds a conversation by phone number.
pub fn find_by_phone(
    db: &Database,
    phone_number: &str,
) -> Result<Option<ConversationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM conversations WHERE phone_number = ?1",
                params![phone_number],
                ConversationRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Counts all conversations.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
        Ok(count)
    })
}
