//! Preview generation for images and videos.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tokio::process::Command;
use tracing::debug;

use crate::error::ThumbnailError;
use crate::media::mime::MediaKind;

pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

impl ThumbnailSize {
    pub const ALL: [ThumbnailSize; 3] =
        [ThumbnailSize::Small, ThumbnailSize::Medium, ThumbnailSize::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThumbnailSize::Small => "small",
            ThumbnailSize::Medium => "medium",
            ThumbnailSize::Large => "large",
        }
    }

    /// Bounding box `(width, height)`.
    pub fn bounds(&self) -> (u32, u32) {
        match self {
            ThumbnailSize::Small => (150, 150),
            ThumbnailSize::Medium => (320, 240),
            ThumbnailSize::Large => (640, 480),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedThumbnail {
    pub size: ThumbnailSize,
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
    pub file_size: u64,
}

/// One requested output: which size, and where to write it.
#[derive(Debug, Clone)]
pub struct ThumbnailTarget {
    pub size: ThumbnailSize,
    pub path: PathBuf,
}

/// Produces previews for a stored file. Each target succeeds or fails on
/// its own; the result vector has one entry per target.
#[async_trait]
pub trait ThumbnailGenerator: Send + Sync {
    async fn generate(
        &self,
        source: &Path,
        kind: MediaKind,
        targets: &[ThumbnailTarget],
    ) -> Vec<Result<GeneratedThumbnail, ThumbnailError>>;
}

/// Decodes with `image`; video frames are grabbed with `ffmpeg` first.
#[derive(Debug, Clone, Default)]
pub struct ImageThumbnailer;

#[async_trait]
impl ThumbnailGenerator for ImageThumbnailer {
    async fn generate(
        &self,
        source: &Path,
        kind: MediaKind,
        targets: &[ThumbnailTarget],
    ) -> Vec<Result<GeneratedThumbnail, ThumbnailError>> {
        let decoded = match kind {
            MediaKind::Image => decode_file(source.to_path_buf()).await,
            MediaKind::Video => extract_video_frame(source).await,
            _ => Err(ThumbnailError::Decode(format!(
                "no previews for {:?} files",
                kind
            ))),
        };

        let img = match decoded {
            Ok(img) => img,
            Err(e) => {
                let reason = e.to_string();
                return targets
                    .iter()
                    .map(|_| Err(ThumbnailError::Decode(reason.clone())))
                    .collect();
            }
        };

        let count = targets.len();
        let targets = targets.to_vec();
        match tokio::task::spawn_blocking(move || {
            targets
                .iter()
                .map(|t| render(&img, t))
                .collect::<Vec<_>>()
        })
        .await
        {
            Ok(results) => results,
            Err(e) => (0..count)
                .map(|_| Err(ThumbnailError::Task(e.to_string())))
                .collect(),
        }
    }
}

async fn decode_file(path: PathBuf) -> Result<DynamicImage, ThumbnailError> {
    tokio::task::spawn_blocking(move || {
        image::open(&path).map_err(|e| ThumbnailError::Decode(e.to_string()))
    })
    .await
    .map_err(|e| ThumbnailError::Task(e.to_string()))?
}

/// Grabs one frame near the start of the video into a temporary PNG.
async fn extract_video_frame(source: &Path) -> Result<DynamicImage, ThumbnailError> {
    let frame_path =
        std::env::temp_dir().join(format!("wabridge-frame-{}.png", uuid::Uuid::new_v4().simple()));
    let result = grab_frame(source, &frame_path).await;
    let _ = tokio::fs::remove_file(&frame_path).await;
    result
}

async fn grab_frame(source: &Path, frame_path: &Path) -> Result<DynamicImage, ThumbnailError> {
    // Seeking past the end yields no frame, so fall back to the first one.
    for seek in ["1", "0"] {
        let status = Command::new("ffmpeg")
            .args(["-y", "-loglevel", "error", "-ss", seek, "-i"])
            .arg(source)
            .args(["-frames:v", "1"])
            .arg(frame_path)
            .status()
            .await
            .map_err(|e| ThumbnailError::VideoFrame(format!("ffmpeg unavailable: {}", e)))?;

        if status.success() && frame_path.exists() {
            return decode_file(frame_path.to_path_buf()).await;
        }
        debug!(seek, "ffmpeg produced no frame");
    }

    Err(ThumbnailError::VideoFrame("no frame extracted".to_string()))
}

/// Fits `img` inside the target bounds (never enlarging) and writes a JPEG.
fn render(img: &DynamicImage, target: &ThumbnailTarget) -> Result<GeneratedThumbnail, ThumbnailError> {
    let (max_w, max_h) = target.size.bounds();
    let fitted = if img.width() <= max_w && img.height() <= max_h {
        img.clone()
    } else {
        img.resize(max_w, max_h, FilterType::Lanczos3)
    };
    let rgb = fitted.to_rgb8();

    let encode_error = |reason: String| ThumbnailError::Encode {
        path: target.path.clone(),
        reason,
    };

    let file = File::create(&target.path).map_err(|e| encode_error(e.to_string()))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| encode_error(e.to_string()))?;
    drop(writer);

    let file_size = std::fs::metadata(&target.path)
        .map_err(|e| encode_error(e.to_string()))?
        .len();

    Ok(GeneratedThumbnail {
        size: target.size,
        width: rgb.width(),
        height: rgb.height(),
        path: target.path.clone(),
        file_size,
    })
}
