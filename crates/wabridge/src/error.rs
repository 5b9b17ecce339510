use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WabridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Send error: {0}")]
    Send(#[from] crate::whatsapp::SendError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret '{name}': {source}")]
    Secret {
        name: String,
        #[source]
        source: crate::secrets::SecretError,
    },

    #[error("Failed to persist settings: {0}")]
    Persist(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Failures talking to the provider's media endpoints.
#[derive(Error, Debug)]
pub enum MediaError {
    /// The metadata lookup answered 404 (expired or invalid id) or 403
    /// (revoked credential).
    #[error("Media '{media_id}' is unavailable (HTTP {status})")]
    Unavailable { media_id: String, status: u16 },

    /// The metadata lookup failed for any other reason.
    #[error("Failed to resolve media '{media_id}': {reason}")]
    Metadata { media_id: String, reason: String },

    /// The metadata lookup succeeded but downloading the bytes failed.
    #[error("Failed to download media '{media_id}': {reason}")]
    Download { media_id: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    #[error("Failed to extract video frame: {0}")]
    VideoFrame(String),

    #[error("Failed to encode thumbnail '{path}': {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Thumbnail task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, WabridgeError>;
