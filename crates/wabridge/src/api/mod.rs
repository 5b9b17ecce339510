//! HTTP surface: webhook endpoints, outbound send, settings and health.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::ConfigProvider;
use crate::db::Database;
use crate::error::WabridgeError;
use crate::ingest::{IngestStats, IngestStatsSnapshot, WebhookProcessor};
use crate::media::{GraphMediaFetcher, ImageThumbnailer, MediaFetcher, MediaStore};
use crate::storage::UploadStorage;
use crate::whatsapp::GraphClient;

pub mod error;
pub mod messages;
pub mod settings;
pub mod webhook;

pub use error::ApiError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ConfigProvider>,
    pub db: Database,
    pub processor: Arc<WebhookProcessor>,
    pub graph: GraphClient,
    pub stats: Arc<IngestStats>,
}

impl AppState {
    /// Wires the production components from the current configuration.
    pub fn from_provider(provider: Arc<ConfigProvider>, db: Database) -> Result<Self, WabridgeError> {
        let config = provider.current();
        let api_root = config.whatsapp.graph_api_root();
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let fetcher: Arc<dyn MediaFetcher> =
            Arc::new(GraphMediaFetcher::new(http.clone(), api_root.clone()));
        let media = Arc::new(MediaStore::new(
            db.clone(),
            UploadStorage::new(&config.storage.uploads_dir),
            Arc::new(ImageThumbnailer),
        ));

        Ok(Self::with_components(
            provider,
            db,
            fetcher,
            media,
            GraphClient::new(http, api_root),
        ))
    }

    /// Assembles state from explicit components.
    pub fn with_components(
        provider: Arc<ConfigProvider>,
        db: Database,
        fetcher: Arc<dyn MediaFetcher>,
        media: Arc<MediaStore>,
        graph: GraphClient,
    ) -> Self {
        let stats = Arc::new(IngestStats::new());
        let processor = Arc::new(WebhookProcessor::new(
            db.clone(),
            Arc::clone(&provider),
            fetcher,
            media,
            Arc::clone(&stats),
        ));

        Self {
            provider,
            db,
            processor,
            graph,
            stats,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/webhook",
            get(webhook::verify_webhook).post(webhook::receive_webhook),
        )
        .route("/api/messages", post(messages::send_message))
        .route(
            "/api/settings/whatsapp",
            get(settings::get_whatsapp_settings).put(settings::put_whatsapp_settings),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    failures: u64,
    ingest: IngestStatsSnapshot,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ingest = state.stats.snapshot();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        failures: ingest.total_failures(),
        ingest,
    })
}
