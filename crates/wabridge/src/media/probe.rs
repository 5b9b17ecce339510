//! Best-effort dimension/duration probing.
//!
//! Images are measured by decoding their header with `image`. Video and
//! audio go through `ffprobe`; when it is missing or fails the fields are
//! simply left empty.

use std::io::Cursor;
use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::media::mime::MediaKind;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaProbe {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
}

pub async fn probe(kind: MediaKind, path: &Path, bytes: &[u8]) -> MediaProbe {
    match kind {
        MediaKind::Image => probe_image(bytes),
        MediaKind::Video | MediaKind::Audio => probe_container(path).await.unwrap_or_default(),
        MediaKind::Document => MediaProbe::default(),
    }
}

/// Reads width/height from the image header without decoding pixels.
pub fn probe_image(bytes: &[u8]) -> MediaProbe {
    let dimensions = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok());

    match dimensions {
        Some((w, h)) => MediaProbe {
            width: Some(i64::from(w)),
            height: Some(i64::from(h)),
            duration: None,
        },
        None => {
            debug!("Image header could not be read");
            MediaProbe::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<i64>,
    #[serde(default)]
    height: Option<i64>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

async fn probe_container(path: &Path) -> Option<MediaProbe> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .output()
        .await
        .map_err(|e| debug!("ffprobe unavailable: {}", e))
        .ok()?;

    if !output.status.success() {
        debug!(status = ?output.status.code(), "ffprobe failed");
        return None;
    }

    parse_ffprobe(&output.stdout)
}

fn parse_ffprobe(stdout: &[u8]) -> Option<MediaProbe> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout).ok()?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or_else(|| parsed.streams.iter().find_map(|s| s.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    Some(MediaProbe {
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        duration,
    })
}
