//! Builders for provider webhook deliveries.

#![allow(dead_code)]

use serde_json::{json, Value};

/// Builds a `whatsapp_business_account` delivery with one change.
pub struct DeliveryBuilder {
    contacts: Vec<Value>,
    messages: Vec<Value>,
    statuses: Vec<Value>,
}

impl DeliveryBuilder {
    pub fn new() -> Self {
        Self {
            contacts: vec![],
            messages: vec![],
            statuses: vec![],
        }
    }

    /// Adds a contact profile for `wa_id`.
    pub fn contact(mut self, wa_id: &str, name: &str) -> Self {
        self.contacts
            .push(json!({ "wa_id": wa_id, "profile": { "name": name } }));
        self
    }

    pub fn text(mut self, id: &str, from: &str, body: &str) -> Self {
        self.messages.push(json!({
            "from": from,
            "id": id,
            "timestamp": "1700000000",
            "type": "text",
            "text": { "body": body }
        }));
        self
    }

    pub fn image(mut self, id: &str, from: &str, media_id: &str) -> Self {
        self.messages.push(json!({
            "from": from,
            "id": id,
            "timestamp": "1700000001",
            "type": "image",
            "image": {
                "id": media_id,
                "mime_type": "image/jpeg",
                "sha256": "provider-digest",
                "caption": "shelf photo"
            }
        }));
        self
    }

    pub fn document(mut self, id: &str, from: &str, media_id: &str, filename: &str) -> Self {
        self.messages.push(json!({
            "from": from,
            "id": id,
            "timestamp": "1700000002",
            "type": "document",
            "document": {
                "id": media_id,
                "mime_type": "application/pdf",
                "filename": filename
            }
        }));
        self
    }

    pub fn raw_message(mut self, envelope: Value) -> Self {
        self.messages.push(envelope);
        self
    }

    pub fn status(mut self, id: &str, status: &str, timestamp: i64) -> Self {
        self.statuses.push(json!({
            "id": id,
            "status": status,
            "timestamp": timestamp.to_string(),
            "recipient_id": "15551234567"
        }));
        self
    }

    pub fn failed_status(mut self, id: &str, code: i64, title: &str) -> Self {
        self.statuses.push(json!({
            "id": id,
            "status": "failed",
            "timestamp": "1700000100",
            "recipient_id": "15551234567",
            "errors": [{ "code": code, "title": title }]
        }));
        self
    }

    pub fn build(self) -> Value {
        let mut value = json!({
            "messaging_product": "whatsapp",
            "metadata": {
                "display_phone_number": "15550001111",
                "phone_number_id": "10987"
            }
        });
        if !self.contacts.is_empty() {
            value["contacts"] = Value::Array(self.contacts);
        }
        if !self.messages.is_empty() {
            value["messages"] = Value::Array(self.messages);
        }
        if !self.statuses.is_empty() {
            value["statuses"] = Value::Array(self.statuses);
        }

        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA-1",
                "changes": [{ "field": "messages", "value": value }]
            }]
        })
    }
}

/// A small JPEG for attachment tests.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
        .encode_image(&img)
        .expect("Failed to encode sample JPEG");
    out
}
