pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod media;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod telemetry;
pub mod whatsapp;

pub use api::{build_router, AppState};
pub use config::{load_config, load_effective_config, Config, ConfigProvider};
pub use db::Database;
pub use error::{ConfigError, MediaError, StorageError, ThumbnailError, WabridgeError};
pub use ingest::{IngestStats, WebhookProcessor};
pub use media::{MediaStore, StoredMedia};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError, SecretSource};
pub use whatsapp::{GraphClient, OutboundMessage};
