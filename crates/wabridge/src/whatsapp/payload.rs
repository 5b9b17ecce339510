//! Webhook delivery shapes.
//!
//! Only the envelope is decoded strictly. Individual messages and statuses
//! stay as raw JSON until their own handler looks at them, so one malformed
//! item cannot reject the whole delivery.

use serde::Deserialize;
use serde_json::Value;

pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<ContactProfile>,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub statuses: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

/// Sender profile delivered alongside messages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

/// Per-type message bodies, tagged by the envelope's `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text { text: TextBody },
    Image { image: MediaBody },
    Video { video: MediaBody },
    Sticker { sticker: MediaBody },
    Document { document: MediaBody },
    Audio { audio: AudioBody },
    Location { location: LocationBody },
    Contacts { contacts: Vec<Value> },
    Interactive { interactive: InteractiveBody },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaBody {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioBody {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub voice: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub file_size: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationBody {
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveBody {
    #[serde(default)]
    pub button_reply: Option<ReplyBody>,
    #[serde(default)]
    pub list_reply: Option<ReplyBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Integer from a JSON number or numeric string; anything else is `None`.
pub fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

/// Float from a JSON number or numeric string.
pub fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// `true`, `"true"` and `1` count as true.
pub fn lenient_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_envelope() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"phone_number_id": "42"},
                        "contacts": [{"wa_id": "1555", "profile": {"name": "Ada"}}],
                        "messages": [{"id": "wamid.1", "type": "text"}]
                    }
                }]
            }]
        }))
        .unwrap();

        let value = &payload.entry[0].changes[0].value;
        assert_eq!(payload.object, BUSINESS_ACCOUNT_OBJECT);
        assert_eq!(value.messages.len(), 1);
        assert!(value.statuses.is_empty());
        assert_eq!(
            value.contacts[0].profile.as_ref().unwrap().name.as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn test_body_tagging() {
        let body: MessageBody = serde_json::from_value(json!({
            "id": "wamid.2",
            "from": "1555",
            "type": "image",
            "image": {"id": "m1", "mime_type": "image/jpeg"}
        }))
        .unwrap();
        assert!(matches!(body, MessageBody::Image { ref image } if image.id == "m1"));

        let unknown = serde_json::from_value::<MessageBody>(json!({"type": "reaction"}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_i64(Some(&json!(12))), Some(12));
        assert_eq!(lenient_i64(Some(&json!("1700000000"))), Some(1_700_000_000));
        assert_eq!(lenient_i64(Some(&json!("7.6"))), Some(8));
        assert_eq!(lenient_i64(Some(&json!("soon"))), None);
        assert_eq!(lenient_i64(Some(&json!(null))), None);
        assert_eq!(lenient_i64(None), None);
        assert_eq!(lenient_f64(Some(&json!("-33.9"))), Some(-33.9));
        assert_eq!(lenient_f64(Some(&json!("north"))), None);
    }

    #[test]
    fn test_lenient_bool() {
        assert!(lenient_bool(Some(&json!(true))));
        assert!(lenient_bool(Some(&json!("TRUE"))));
        assert!(!lenient_bool(Some(&json!(false))));
        assert!(!lenient_bool(None));
    }
}
