//! Subscription handshake (`GET /webhook`).

use secrecy::SecretString;
use serde::Deserialize;
use tracing::warn;

use crate::secrets::constant_time_eq;
use crate::whatsapp::error::VerifyRejection;

const SUBSCRIBE_MODE: &str = "subscribe";

/// Query parameters of the handshake, named as the provider sends them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Returns the challenge to echo when the handshake is valid.
///
/// `expected` is the configured verify token; with none configured every
/// handshake is refused.
pub fn verify(
    query: &VerifyQuery,
    expected: Option<&SecretString>,
) -> Result<String, VerifyRejection> {
    let mode = query
        .mode
        .as_deref()
        .ok_or(VerifyRejection::MissingParameter("hub.mode"))?;
    let token = query
        .verify_token
        .as_deref()
        .ok_or(VerifyRejection::MissingParameter("hub.verify_token"))?;
    let challenge = query
        .challenge
        .as_deref()
        .ok_or(VerifyRejection::MissingParameter("hub.challenge"))?;

    let Some(expected) = expected else {
        warn!("Webhook verification attempted but no verify token is configured");
        return Err(VerifyRejection::Forbidden);
    };

    if mode == SUBSCRIBE_MODE && constant_time_eq(token, expected) {
        Ok(challenge.to_string())
    } else {
        Err(VerifyRejection::Forbidden)
    }
}
