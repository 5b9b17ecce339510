use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{ApiError, AppState};
use crate::ingest::parse_delivery;
use crate::whatsapp::{verify, VerifyQuery};

/// `GET /webhook`: echoes `hub.challenge` when the token matches.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, ApiError> {
    let config = state.provider.current();
    let expected = config.verify_token()?;
    let challenge = verify(&query, expected.as_ref())?;
    info!("Webhook subscription verified");
    Ok(challenge)
}

/// `POST /webhook`: 400 only when the body is not a business-account
/// delivery. Everything past that answers 200.
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let payload = match parse_delivery(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected webhook delivery");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": e.to_string() })),
            );
        }
    };

    let report = state.processor.process(&payload).await;
    (StatusCode::OK, Json(json!({ "success": report.is_clean() })))
}
