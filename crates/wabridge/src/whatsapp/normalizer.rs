//! Maps inbound message envelopes onto the single `messages` row shape.

use serde_json::{json, Value};
use tracing::debug;

use crate::db::message_repo::{self, Direction, NewMessage};
use crate::db::{conversation_repo, Database, DatabaseError};
use crate::whatsapp::error::EnvelopeError;
use crate::whatsapp::payload::{
    lenient_bool, lenient_f64, lenient_i64, AudioBody, ChangeValue, InteractiveBody, LocationBody,
    MediaBody, MessageBody, TextBody,
};

pub const STATUS_RECEIVED: &str = "received";
/// Message type recorded for variants without a dedicated extractor.
pub const MESSAGE_TYPE_UNSUPPORTED: &str = "unsupported";

/// Per-type fields pulled out of one envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub message_type: String,
    pub content: Option<String>,
    pub media_id: Option<String>,
    pub mime_type: Option<String>,
    pub sha256: Option<String>,
    pub file_size: Option<i64>,
    pub voice_duration: Option<i64>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub whatsapp_message_id: String,
    pub from: String,
    pub timestamp: Option<i64>,
    pub extracted: Extracted,
}

/// Sender names seen in a delivery, in decreasing priority.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactNames {
    pub push_name: Option<String>,
    pub profile_name: Option<String>,
    pub contact_name: Option<String>,
}

impl ContactNames {
    /// Best known human name, if any. Callers fall back to the phone number.
    pub fn display_name(&self) -> Option<&str> {
        self.push_name
            .as_deref()
            .or(self.profile_name.as_deref())
            .or(self.contact_name.as_deref())
    }

    /// Name stored in `profile_name`.
    pub fn stored_profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref().or(self.contact_name.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted { message_id: i64, conversation_id: i64 },
    Duplicate,
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Collects the names for `from` out of the delivery's side-channel data.
pub fn contact_names(value: &ChangeValue, envelope: &Value, from: &str) -> ContactNames {
    let push_name = non_empty(
        envelope
            .get("push_name")
            .or_else(|| envelope.get("pushName"))
            .and_then(Value::as_str),
    );

    let profile_of = |c: &crate::whatsapp::payload::ContactProfile| {
        non_empty(c.profile.as_ref().and_then(|p| p.name.as_deref()))
    };

    let profile_name = value
        .contacts
        .iter()
        .find(|c| c.wa_id.as_deref() == Some(from))
        .and_then(profile_of);

    let contact_name = value.contacts.iter().find_map(profile_of);

    ContactNames {
        push_name,
        profile_name,
        contact_name,
    }
}

/// Decodes the common envelope fields and dispatches on the message type.
pub fn normalize(envelope: &Value) -> Result<NormalizedMessage, EnvelopeError> {
    if !envelope.is_object() {
        return Err(EnvelopeError::NotAnObject);
    }
    let whatsapp_message_id = non_empty(envelope.get("id").and_then(Value::as_str))
        .ok_or(EnvelopeError::MissingField("id"))?;
    let from = non_empty(envelope.get("from").and_then(Value::as_str))
        .ok_or(EnvelopeError::MissingField("from"))?;
    let timestamp = lenient_i64(envelope.get("timestamp"));

    let extracted = match serde_json::from_value::<MessageBody>(envelope.clone()) {
        Ok(body) => body.extract(),
        Err(e) => {
            debug!(error = %e, "Unsupported or malformed message body");
            extract_unsupported(envelope)
        }
    };

    Ok(NormalizedMessage {
        whatsapp_message_id,
        from,
        timestamp,
        extracted,
    })
}

impl MessageBody {
    pub fn extract(self) -> Extracted {
        match self {
            MessageBody::Text { text } => extract_text(text),
            MessageBody::Image { image } => extract_media("image", image),
            MessageBody::Video { video } => extract_media("video", video),
            MessageBody::Sticker { sticker } => extract_media("sticker", sticker),
            MessageBody::Document { document } => extract_document(document),
            MessageBody::Audio { audio } => extract_audio(audio),
            MessageBody::Location { location } => extract_location(location),
            MessageBody::Contacts { contacts } => extract_contacts(contacts),
            MessageBody::Interactive { interactive } => extract_interactive(interactive),
        }
    }
}

fn extract_text(text: TextBody) -> Extracted {
    Extracted {
        message_type: "text".to_string(),
        content: Some(text.body),
        ..Default::default()
    }
}

fn extract_media(message_type: &str, media: MediaBody) -> Extracted {
    Extracted {
        message_type: message_type.to_string(),
        content: media.caption,
        file_size: lenient_i64(media.file_size.as_ref()),
        media_id: Some(media.id),
        mime_type: media.mime_type,
        sha256: media.sha256,
        filename: media.filename,
        voice_duration: None,
    }
}

fn extract_document(document: MediaBody) -> Extracted {
    let content = document.caption.clone().or_else(|| document.filename.clone());
    Extracted {
        content,
        ..extract_media("document", document)
    }
}

fn extract_audio(audio: AudioBody) -> Extracted {
    let is_voice = lenient_bool(audio.voice.as_ref());
    Extracted {
        message_type: if is_voice { "voice" } else { "audio" }.to_string(),
        content: None,
        media_id: Some(audio.id),
        mime_type: audio.mime_type,
        sha256: audio.sha256,
        file_size: lenient_i64(audio.file_size.as_ref()),
        voice_duration: if is_voice {
            lenient_i64(audio.duration.as_ref())
        } else {
            None
        },
        filename: None,
    }
}

fn extract_location(location: LocationBody) -> Extracted {
    let content = json!({
        "latitude": lenient_f64(location.latitude.as_ref()),
        "longitude": lenient_f64(location.longitude.as_ref()),
        "name": location.name,
        "address": location.address,
    });
    Extracted {
        message_type: "location".to_string(),
        content: Some(content.to_string()),
        ..Default::default()
    }
}

fn extract_contacts(contacts: Vec<Value>) -> Extracted {
    Extracted {
        message_type: "contacts".to_string(),
        content: Some(Value::Array(contacts).to_string()),
        ..Default::default()
    }
}

fn extract_interactive(interactive: InteractiveBody) -> Extracted {
    let title = interactive
        .button_reply
        .as_ref()
        .and_then(|r| r.title.clone())
        .or_else(|| interactive.list_reply.as_ref().and_then(|r| r.title.clone()));

    let content = match title {
        Some(title) => title,
        None => interactive_json(&interactive).to_string(),
    };

    Extracted {
        message_type: "interactive".to_string(),
        content: Some(content),
        ..Default::default()
    }
}

fn interactive_json(interactive: &InteractiveBody) -> Value {
    let reply = |r: &crate::whatsapp::payload::ReplyBody| json!({"id": r.id, "title": r.title});
    let mut obj = serde_json::Map::new();
    if let Some(r) = &interactive.button_reply {
        obj.insert("button_reply".to_string(), reply(r));
    }
    if let Some(r) = &interactive.list_reply {
        obj.insert("list_reply".to_string(), reply(r));
    }
    Value::Object(obj)
}

/// The envelope, which still carries the provider's `type`, becomes the
/// content.
fn extract_unsupported(envelope: &Value) -> Extracted {
    Extracted {
        message_type: MESSAGE_TYPE_UNSUPPORTED.to_string(),
        content: Some(envelope.to_string()),
        ..Default::default()
    }
}

/// Writes the message (and its conversation) unless it was seen before.
pub fn record_incoming(
    db: &Database,
    message: &NormalizedMessage,
    names: &ContactNames,
) -> Result<RecordOutcome, DatabaseError> {
    db.with_tx(|tx| {
        if message_repo::find_by_whatsapp_id_with(tx, &message.whatsapp_message_id)?.is_some() {
            return Ok(RecordOutcome::Duplicate);
        }

        let conversation = conversation_repo::upsert_with(
            tx,
            &message.from,
            names.display_name(),
            names.stored_profile_name(),
            message.timestamp,
        )?;

        let e = &message.extracted;
        let new_message = NewMessage {
            whatsapp_message_id: message.whatsapp_message_id.clone(),
            conversation_id: conversation.id,
            phone_number: message.from.clone(),
            direction: Direction::Incoming,
            message_type: e.message_type.clone(),
            content: e.content.clone(),
            media_url: e.media_id.clone(),
            media_mime_type: e.mime_type.clone(),
            media_sha256: e.sha256.clone(),
            media_file_size: e.file_size,
            voice_duration: e.voice_duration,
            timestamp: message.timestamp,
            status: STATUS_RECEIVED.to_string(),
        };

        match message_repo::insert_if_absent(tx, &new_message)? {
            Some(message_id) => Ok(RecordOutcome::Inserted {
                message_id,
                conversation_id: conversation.id,
            }),
            None => Ok(RecordOutcome::Duplicate),
        }
    })
}
