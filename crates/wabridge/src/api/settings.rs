use axum::extract::State;
use axum::Json;

use crate::api::{ApiError, AppState};
use crate::config::{WhatsAppSettingsUpdate, WhatsAppSettingsView};

/// `GET /api/settings/whatsapp`
pub async fn get_whatsapp_settings(State(state): State<AppState>) -> Json<WhatsAppSettingsView> {
    Json(state.provider.whatsapp_view())
}

/// `PUT /api/settings/whatsapp`
pub async fn put_whatsapp_settings(
    State(state): State<AppState>,
    Json(update): Json<WhatsAppSettingsUpdate>,
) -> Result<Json<WhatsAppSettingsView>, ApiError> {
    state.provider.update_whatsapp(&update)?;
    Ok(Json(state.provider.whatsapp_view()))
}
