//! Graph API client for outbound sends.

use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::sanitize::{mask_phone, redact_credentials};
use crate::whatsapp::error::SendError;
use crate::whatsapp::outbound::OutboundMessage;

/// Provider acknowledgement of a send.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub whatsapp_message_id: String,
    pub wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    contacts: Vec<SendContact>,
    #[serde(default)]
    messages: Vec<SendMessageId>,
}

#[derive(Debug, Deserialize)]
struct SendContact {
    #[serde(default)]
    wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessageId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

#[derive(Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    api_root: String,
}

impl GraphClient {
    /// `api_root` is `{graph_base_url}/{api_version}`.
    pub fn new(client: reqwest::Client, api_root: impl Into<String>) -> Self {
        Self {
            client,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip_all, fields(to = %mask_phone(to), kind = message.message_type()))]
    pub async fn send(
        &self,
        access_token: &SecretString,
        phone_number_id: &str,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<SentMessage, SendError> {
        message.validate(to)?;

        let url = format!("{}/{}/messages", self.api_root, phone_number_id);
        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", access_token.expose_secret()),
            )
            .json(&message.to_graph_payload(to))
            .send()
            .await
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SendError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            let (code, text) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(env) => (
                    env.error.code,
                    env.error
                        .message
                        .unwrap_or_else(|| "unknown error".to_string()),
                ),
                Err(_) => (None, redact_credentials(&body)),
            };
            return Err(SendError::Api {
                status: status.as_u16(),
                code,
                message: text,
            });
        }

        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|e| SendError::InvalidResponse(e.to_string()))?;
        let whatsapp_message_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| SendError::InvalidResponse("no message id returned".to_string()))?;

        info!(whatsapp_message_id = %whatsapp_message_id, "Message accepted by provider");

        Ok(SentMessage {
            whatsapp_message_id,
            wa_id: parsed.contacts.into_iter().next().and_then(|c| c.wa_id),
        })
    }
}
