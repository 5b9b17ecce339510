//! Test harness for isolated HTTP-level tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use wabridge::config::{Config, ConfigProvider};
use wabridge::db::Database;
use wabridge::error::MediaError;
use wabridge::media::{FetchedMedia, ImageThumbnailer, MediaFetcher, MediaStore};
use wabridge::secrets::SecretSource;
use wabridge::storage::UploadStorage;
use wabridge::whatsapp::GraphClient;
use wabridge::{build_router, AppState};

pub const VERIFY_TOKEN: &str = "verify-me";
pub const ACCESS_TOKEN: &str = "EAAG-test";
pub const PHONE_NUMBER_ID: &str = "10987";

/// Serves registered attachments; anything else is reported as expired.
#[derive(Default)]
pub struct FakeFetcher {
    media: Mutex<HashMap<String, (Vec<u8>, String)>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn register(&self, media_id: &str, bytes: Vec<u8>, mime_type: &str) {
        self.media
            .lock()
            .unwrap()
            .insert(media_id.to_string(), (bytes, mime_type.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(
        &self,
        media_id: &str,
        _access_token: &SecretString,
    ) -> Result<FetchedMedia, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.media.lock().unwrap().get(media_id).cloned();
        match entry {
            Some((bytes, mime_type)) => Ok(FetchedMedia {
                size: bytes.len() as u64,
                filename: format!("{}.bin", media_id),
                bytes,
                mime_type,
                sha256: None,
            }),
            None => Err(MediaError::Unavailable {
                media_id: media_id.to_string(),
                status: 404,
            }),
        }
    }
}

/// Router plus the handles tests inspect.
pub struct TestHarness {
    temp_dir: TempDir,
    pub uploads_dir: PathBuf,
    pub db: Database,
    pub fetcher: Arc<FakeFetcher>,
    pub state: AppState,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_graph_url("http://127.0.0.1:9")
    }

    /// Harness whose outbound client talks to `graph_base_url`.
    pub fn with_graph_url(graph_base_url: &str) -> Self {
        let mut config = Config::default();
        config.whatsapp.verify_token = SecretSource::from_value(VERIFY_TOKEN);
        config.whatsapp.access_token = SecretSource::from_value(ACCESS_TOKEN);
        config.whatsapp.phone_number_id = Some(PHONE_NUMBER_ID.to_string());
        config.whatsapp.graph_base_url = graph_base_url.to_string();
        Self::with_config(config)
    }

    pub fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let uploads_dir = temp_dir.path().join("uploads");
        config.storage.uploads_dir = uploads_dir.clone();
        config.storage.database_path = temp_dir.path().join("unused.db");

        let db = Database::open_in_memory().expect("Failed to open database");
        let api_root = config.whatsapp.graph_api_root();
        let provider = Arc::new(
            ConfigProvider::new(config, db.clone()).expect("Failed to build config provider"),
        );

        let fetcher = Arc::new(FakeFetcher::default());
        let media = Arc::new(MediaStore::new(
            db.clone(),
            UploadStorage::new(&uploads_dir),
            Arc::new(ImageThumbnailer),
        ));
        let state = AppState::with_components(
            provider,
            db.clone(),
            Arc::clone(&fetcher) as Arc<dyn MediaFetcher>,
            media,
            GraphClient::new(reqwest::Client::new(), api_root),
        );

        Self {
            temp_dir,
            uploads_dir,
            db,
            fetcher,
            state,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Sends one request and returns status plus body bytes.
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, bytes.to_vec())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = self.request(request).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post_webhook(&self, body: &Value) -> (StatusCode, Value) {
        self.send_json("POST", "/webhook", body).await
    }

    /// Counts regular files under `uploads/<subdir>`.
    pub fn file_count(&self, subdir: &str) -> usize {
        let dir = self.uploads_dir.join(subdir);
        match std::fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .count(),
            Err(_) => 0,
        }
    }
}
