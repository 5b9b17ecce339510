//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Logs are shipped off-box, so customer phone numbers and provider
//! credentials must never appear in them verbatim.

use std::path::Path;

/// Masks all but the last four digits of a phone number.
///
/// - `15551234567` → `*******4567`
/// - `123` → `***`
pub fn mask_phone(phone: &str) -> String {
    let len = phone.chars().count();
    if len <= 4 {
        return "*".repeat(len);
    }
    let visible: String = phone.chars().skip(len - 4).collect();
    format!("{}{}", "*".repeat(len - 4), visible)
}

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Replaces the token of any `Bearer <token>` occurrence and strips
/// `access_token=` query values from a string (URLs, error bodies).
pub fn redact_credentials(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some((marker_len, start)) = find_marker(rest) {
        out.push_str(&rest[..start + marker_len]);
        out.push_str("****");
        let after = &rest[start + marker_len..];
        let end = after
            .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'')
            .unwrap_or(after.len());
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}

/// Finds the earliest credential marker; returns `(marker_len, index)`.
fn find_marker(s: &str) -> Option<(usize, usize)> {
    ["Bearer ", "access_token="]
        .iter()
        .filter_map(|m| s.find(m).map(|i| (m.len(), i)))
        .min_by_key(|(_, i)| *i)
}
