//! Outbound message model, validation and bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::message_repo::{self, Direction, NewMessage};
use crate::db::{conversation_repo, Database, DatabaseError};
use crate::whatsapp::error::SendError;

pub const MAX_TEXT_LEN: usize = 4096;
pub const STATUS_SENT: &str = "sent";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Text {
        body: String,
        #[serde(default)]
        preview_url: bool,
    },
    Image {
        link: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Video {
        link: String,
        #[serde(default)]
        caption: Option<String>,
    },
    Audio {
        link: String,
    },
    Document {
        link: String,
        #[serde(default)]
        caption: Option<String>,
        #[serde(default)]
        filename: Option<String>,
    },
}

impl OutboundMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::Image { .. } => "image",
            OutboundMessage::Video { .. } => "video",
            OutboundMessage::Audio { .. } => "audio",
            OutboundMessage::Document { .. } => "document",
        }
    }

    fn link(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text { .. } => None,
            OutboundMessage::Image { link, .. }
            | OutboundMessage::Video { link, .. }
            | OutboundMessage::Audio { link }
            | OutboundMessage::Document { link, .. } => Some(link),
        }
    }

    /// Text stored in the `content` column.
    fn content(&self) -> Option<String> {
        match self {
            OutboundMessage::Text { body, .. } => Some(body.clone()),
            OutboundMessage::Image { caption, .. } | OutboundMessage::Video { caption, .. } => {
                caption.clone()
            }
            OutboundMessage::Audio { .. } => None,
            OutboundMessage::Document {
                caption, filename, ..
            } => caption.clone().or_else(|| filename.clone()),
        }
    }

    pub fn validate(&self, to: &str) -> Result<(), SendError> {
        let digits = to.trim_start_matches('+');
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(SendError::Validation(
                "recipient must be a phone number".to_string(),
            ));
        }

        if let OutboundMessage::Text { body, .. } = self {
            if body.trim().is_empty() {
                return Err(SendError::Validation("text body is empty".to_string()));
            }
            if body.chars().count() > MAX_TEXT_LEN {
                return Err(SendError::Validation(format!(
                    "text body exceeds {} characters",
                    MAX_TEXT_LEN
                )));
            }
        }

        if let Some(link) = self.link() {
            if !(link.starts_with("https://") || link.starts_with("http://")) {
                return Err(SendError::Validation(
                    "media link must be an http(s) URL".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Request body for `POST /{phone_number_id}/messages`.
    pub fn to_graph_payload(&self, to: &str) -> Value {
        let body = match self {
            OutboundMessage::Text { body, preview_url } => {
                json!({ "body": body, "preview_url": preview_url })
            }
            OutboundMessage::Image { link, caption } | OutboundMessage::Video { link, caption } => {
                let mut obj = json!({ "link": link });
                if let Some(caption) = caption {
                    obj["caption"] = json!(caption);
                }
                obj
            }
            OutboundMessage::Audio { link } => json!({ "link": link }),
            OutboundMessage::Document {
                link,
                caption,
                filename,
            } => {
                let mut obj = json!({ "link": link });
                if let Some(caption) = caption {
                    obj["caption"] = json!(caption);
                }
                if let Some(filename) = filename {
                    obj["filename"] = json!(filename);
                }
                obj
            }
        };

        let kind = self.message_type();
        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to.trim_start_matches('+'),
            "type": kind,
        });
        payload[kind] = body;
        payload
    }
}

/// Records an accepted send as an `outgoing` message with status `sent`.
pub fn record_outgoing(
    db: &Database,
    to: &str,
    message: &OutboundMessage,
    whatsapp_message_id: &str,
    sent_at: i64,
) -> Result<i64, DatabaseError> {
    let phone = to.trim_start_matches('+');
    db.with_tx(|tx| {
        let conversation = conversation_repo::upsert_with(tx, phone, None, None, Some(sent_at))?;
        let new_message = NewMessage {
            whatsapp_message_id: whatsapp_message_id.to_string(),
            conversation_id: conversation.id,
            phone_number: phone.to_string(),
            direction: Direction::Outgoing,
            message_type: message.message_type().to_string(),
            content: message.content(),
            media_url: message.link().map(str::to_string),
            media_mime_type: None,
            media_sha256: None,
            media_file_size: None,
            voice_duration: None,
            timestamp: Some(sent_at),
            status: STATUS_SENT.to_string(),
        };

        match message_repo::insert_if_absent(tx, &new_message)? {
            Some(id) => Ok(id),
            None => message_repo::find_by_whatsapp_id_with(tx, whatsapp_message_id)?
                .map(|row| row.id)
                .ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows)),
        }
    })
}
