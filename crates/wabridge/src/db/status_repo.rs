//! Append-only delivery status history (`message_status_history`).

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEventRow {
    pub id: i64,
    pub message_id: i64,
    pub status: String,
    pub timestamp: Option<i64>,
    pub failure_reason: Option<String>,
    pub error_code: Option<i64>,
    pub error_title: Option<String>,
    pub created_at: String,
}

impl StatusEventRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            message_id: row.get("message_id")?,
            status: row.get("status")?,
            timestamp: row.get("timestamp")?,
            failure_reason: row.get("failure_reason")?,
            error_code: row.get("error_code")?,
            error_title: row.get("error_title")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewStatusEvent<'a> {
    pub status: &'a str,
    pub timestamp: Option<i64>,
    pub failure_reason: Option<&'a str>,
    pub error_code: Option<i64>,
    pub error_title: Option<&'a str>,
}

/// Appends one history row and returns its id.
pub fn append_with(
    conn: &Connection,
    message_id: i64,
    event: &NewStatusEvent<'_>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO message_status_history (message_id, status, timestamp, failure_reason,
         error_code, error_title, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            message_id,
            event.status,
            event.timestamp,
            event.failure_reason,
            event.error_code,
            event.error_title,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns a message's status history in insertion order.
pub fn list_for_message(db: &Database, message_id: i64) -> Result<Vec<StatusEventRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM message_status_history WHERE message_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![message_id], StatusEventRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
