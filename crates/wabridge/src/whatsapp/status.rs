//! Delivery status tracking for outbound messages.

use serde_json::Value;
use tracing::{info, warn};

use crate::db::status_repo::{self, NewStatusEvent};
use crate::db::{message_repo, Database, DatabaseError};
use crate::whatsapp::error::EnvelopeError;
use crate::whatsapp::payload::lenient_i64;

pub const STATUS_FAILED: &str = "failed";
pub const REASON_24_HOUR_RULE: &str = "24_hour_rule";
pub const REASON_GENERAL_ERROR: &str = "general_error";

/// Provider error code for "message sent outside the customer care window".
pub const RE_ENGAGEMENT_ERROR_CODE: i64 = 131047;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub whatsapp_message_id: String,
    pub status: String,
    pub timestamp: Option<i64>,
    pub error_code: Option<i64>,
    pub error_title: Option<String>,
    /// Free text from `message` and `error_data.details`, used for tagging.
    pub error_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Recorded { message_id: i64 },
    /// No stored message carries this id. Logged, not an error.
    UnknownMessage,
}

/// Decodes one entry of a delivery's `statuses` array.
pub fn parse_status(value: &Value) -> Result<StatusUpdate, EnvelopeError> {
    if !value.is_object() {
        return Err(EnvelopeError::NotAnObject);
    }
    let str_field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let whatsapp_message_id = str_field("id").ok_or(EnvelopeError::MissingField("id"))?;
    let status = str_field("status")
        .ok_or(EnvelopeError::MissingField("status"))?
        .to_ascii_lowercase();

    let first_error = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());

    let error_code = first_error.and_then(|e| lenient_i64(e.get("code")));
    let error_title = first_error
        .and_then(|e| e.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let error_text = first_error.and_then(|e| {
        let parts: Vec<&str> = [
            e.get("message").and_then(Value::as_str),
            e.get("error_data")
                .and_then(|d| d.get("details"))
                .and_then(Value::as_str),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    });

    Ok(StatusUpdate {
        whatsapp_message_id,
        status,
        timestamp: lenient_i64(value.get("timestamp")),
        error_code,
        error_title,
        error_text,
    })
}

/// Tags a failed delivery; `None` for every other status.
pub fn failure_reason(update: &StatusUpdate) -> Option<&'static str> {
    if update.status != STATUS_FAILED {
        return None;
    }
    if update.error_code == Some(RE_ENGAGEMENT_ERROR_CODE) {
        return Some(REASON_24_HOUR_RULE);
    }

    let mentions_window = [update.error_title.as_deref(), update.error_text.as_deref()]
        .into_iter()
        .flatten()
        .any(mentions_24_hour_rule);

    if mentions_window {
        Some(REASON_24_HOUR_RULE)
    } else {
        Some(REASON_GENERAL_ERROR)
    }
}

fn mentions_24_hour_rule(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let phrase = ["24 hour", "24-hour", "re-engagement", "reengagement"]
        .iter()
        .any(|needle| lower.contains(needle));
    // "24h" only as a whole token, so "124h" does not match.
    phrase
        || lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| token == "24h")
}

/// Projects the status onto the message and appends it to the history,
/// atomically.
pub fn record_status(db: &Database, update: &StatusUpdate) -> Result<StatusOutcome, DatabaseError> {
    let reason = failure_reason(update);

    let outcome = db.with_tx(|tx| {
        let Some(message) = message_repo::find_by_whatsapp_id_with(tx, &update.whatsapp_message_id)?
        else {
            return Ok(StatusOutcome::UnknownMessage);
        };

        message_repo::update_status_with(
            tx,
            message.id,
            &update.status,
            reason,
            update.error_code,
            update.error_title.as_deref(),
        )?;
        status_repo::append_with(
            tx,
            message.id,
            &NewStatusEvent {
                status: &update.status,
                timestamp: update.timestamp,
                failure_reason: reason,
                error_code: update.error_code,
                error_title: update.error_title.as_deref(),
            },
        )?;
        Ok(StatusOutcome::Recorded {
            message_id: message.id,
        })
    })?;

    match &outcome {
        StatusOutcome::Recorded { message_id } => info!(
            message_id,
            status = %update.status,
            failure_reason = reason.unwrap_or(""),
            "Status recorded"
        ),
        StatusOutcome::UnknownMessage => warn!(
            whatsapp_message_id = %update.whatsapp_message_id,
            status = %update.status,
            "Status for unknown message ignored"
        ),
    }
    Ok(outcome)
}
