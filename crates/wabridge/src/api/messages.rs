use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::whatsapp::outbound::record_outgoing;
use crate::whatsapp::{OutboundMessage, SendError};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    #[serde(flatten)]
    pub message: OutboundMessage,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message_id: i64,
    pub whatsapp_message_id: String,
}

/// `POST /api/messages`
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let config = state.provider.current();
    let access_token = config
        .access_token()?
        .ok_or(SendError::NotConfigured("access_token"))?;
    let phone_number_id = config
        .whatsapp
        .phone_number_id
        .as_deref()
        .ok_or(SendError::NotConfigured("phone_number_id"))?;

    let sent = state
        .graph
        .send(&access_token, phone_number_id, &request.to, &request.message)
        .await?;

    let message_id = record_outgoing(
        &state.db,
        &request.to,
        &request.message,
        &sent.whatsapp_message_id,
        chrono::Utc::now().timestamp(),
    )?;

    Ok(Json(SendMessageResponse {
        success: true,
        message_id,
        whatsapp_message_id: sent.whatsapp_message_id,
    }))
}
