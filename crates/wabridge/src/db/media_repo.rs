//! Media repository: `media_files` and their `media_thumbnails`.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_rfc3339, Database, DatabaseError};

/// Lifecycle of a stored media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    Processing,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
        }
    }
}

/// A raw media file row from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFileRow {
    pub id: i64,
    pub whatsapp_media_id: Option<String>,
    pub original_filename: String,
    pub file_path: String,
    pub thumbnail_path: Option<String>,
    pub mime_type: String,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub file_hash: String,
    pub status: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MediaFileRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            whatsapp_media_id: row.get("whatsapp_media_id")?,
            original_filename: row.get("original_filename")?,
            file_path: row.get("file_path")?,
            thumbnail_path: row.get("thumbnail_path")?,
            mime_type: row.get("mime_type")?,
            file_size: row.get("file_size")?,
            width: row.get("width")?,
            height: row.get("height")?,
            duration: row.get("duration")?,
            file_hash: row.get("file_hash")?,
            status: row.get("status")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields supplied when a new media file lands on disk.
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub whatsapp_media_id: Option<String>,
    pub original_filename: String,
    pub file_path: String,
    pub mime_type: String,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub file_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailRow {
    pub id: i64,
    pub media_file_id: i64,
    pub size_type: String,
    pub width: i64,
    pub height: i64,
    pub file_path: String,
    pub file_size: i64,
}

impl ThumbnailRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            media_file_id: row.get("media_file_id")?,
            size_type: row.get("size_type")?,
            width: row.get("width")?,
            height: row.get("height")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewThumbnail {
    pub size_type: String,
    pub width: i64,
    pub height: i64,
    pub file_path: String,
    pub file_size: i64,
}

fn find_one(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Option<MediaFileRow>, DatabaseError> {
    let row = conn
        .query_row(sql, [key], MediaFileRow::from_row)
        .optional()?;
    Ok(row)
}

/// Looks up a media file by content hash (the dedup key).
pub fn find_by_hash(db: &Database, file_hash: &str) -> Result<Option<MediaFileRow>, DatabaseError> {
    db.with_conn(|conn| find_one(conn, "SELECT * FROM media_files WHERE file_hash = ?1", &file_hash))
}

pub fn find_by_id(db: &Database, id: i64) -> Result<Option<MediaFileRow>, DatabaseError> {
    db.with_conn(|conn| find_one(conn, "SELECT * FROM media_files WHERE id = ?1", &id))
}

pub fn find_by_whatsapp_media_id(
    db: &Database,
    whatsapp_media_id: &str,
) -> Result<Option<MediaFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        find_one(
            conn,
            "SELECT * FROM media_files WHERE whatsapp_media_id = ?1",
            &whatsapp_media_id,
        )
    })
}

/// Inserts a media file in `processing` state and returns its id.
///
/// Fails with a unique violation when the hash (or provider media id) is
/// already stored; callers treat that as a lost dedup race.
pub fn insert_processing(db: &Database, file: &NewMediaFile) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO media_files (whatsapp_media_id, original_filename, file_path, mime_type,
             file_size, width, height, duration, file_hash, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                file.whatsapp_media_id,
                file.original_filename,
                file.file_path,
                file.mime_type,
                file.file_size,
                file.width,
                file.height,
                file.duration,
                file.file_hash,
                MediaStatus::Processing.as_str(),
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn insert_thumbnail_with(
    conn: &Connection,
    media_file_id: i64,
    thumb: &NewThumbnail,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO media_thumbnails (media_file_id, size_type, width, height, file_path, file_size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(media_file_id, size_type) DO UPDATE SET
           width = excluded.width, height = excluded.height,
           file_path = excluded.file_path, file_size = excluded.file_size",
        params![
            media_file_id,
            thumb.size_type,
            thumb.width,
            thumb.height,
            thumb.file_path,
            thumb.file_size,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Marks the file `completed` and records its preview thumbnail path.
pub fn mark_completed_with(
    conn: &Connection,
    id: i64,
    thumbnail_path: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE media_files SET status = ?2, thumbnail_path = ?3, error = NULL, updated_at = ?4
         WHERE id = ?1",
        params![id, MediaStatus::Completed.as_str(), thumbnail_path, now_rfc3339()],
    )?;
    Ok(())
}

pub fn mark_failed(db: &Database, id: i64, error: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE media_files SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, MediaStatus::Failed.as_str(), error, now_rfc3339()],
        )?;
        Ok(())
    })
}

pub fn list_thumbnails(db: &Database, media_file_id: i64) -> Result<Vec<ThumbnailRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM media_thumbnails WHERE media_file_id = ?1
             ORDER BY CASE size_type WHEN 'small' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END",
        )?;
        let rows = stmt
            .query_map(params![media_file_id], ThumbnailRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM media_files", [], |r| r.get(0))?;
        Ok(count)
    })
}
