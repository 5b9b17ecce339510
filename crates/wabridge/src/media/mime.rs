//! Mime-type helpers: storage family and file extension.

/// Broad media family, which decides the storage subdirectory and which
/// post-processing applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let essence = essence(mime_type);
        if essence.starts_with("image/") {
            MediaKind::Image
        } else if essence.starts_with("video/") {
            MediaKind::Video
        } else if essence.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }

    pub fn subdir(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audio",
            MediaKind::Document => "documents",
        }
    }

    /// Whether previews are generated for this family.
    pub fn has_thumbnails(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

/// Lower-cased mime type without parameters (`audio/ogg; codecs=opus` → `audio/ogg`).
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Preferred extensions for the types the provider actually sends. The
/// generic table has several spellings for some of these.
const PREFERRED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/3gpp", "3gp"),
    ("audio/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/aac", "aac"),
    ("audio/amr", "amr"),
    ("audio/mp4", "m4a"),
    ("application/pdf", "pdf"),
    ("text/plain", "txt"),
];

/// Extension from the mime type alone, or `None` when unknown.
pub fn extension_for_mime(mime_type: &str) -> Option<String> {
    let essence = essence(mime_type);
    if let Some((_, ext)) = PREFERRED.iter().find(|(m, _)| *m == essence) {
        return Some((*ext).to_string());
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| (*ext).to_string())
}

/// Extension for a stored file: the original filename's extension if it
/// has a sane one, else the mime table, else `bin`.
pub fn extension_for(original_filename: &str, mime_type: &str) -> String {
    let from_name = std::path::Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase());

    from_name
        .or_else(|| extension_for_mime(mime_type))
        .unwrap_or_else(|| "bin".to_string())
}
