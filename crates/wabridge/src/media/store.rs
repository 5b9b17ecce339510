//! Content-addressed media storage.
//!
//! Files are keyed by the SHA-256 of their bytes. Storing content that is
//! already `completed` returns the existing row; new content is written under
//! the uploads tree, probed, recorded as `processing`, given thumbnails, and
//! finally marked `completed`. A row stuck in `processing` or `failed` is
//! finished by the next store of the same bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::db::media_repo::{self, MediaFileRow, MediaStatus, NewMediaFile, NewThumbnail};
use crate::db::{Database, DatabaseError};
use crate::error::{StorageError, WabridgeError};
use crate::media::mime::{extension_for, MediaKind};
use crate::media::probe::probe;
use crate::media::thumbnail::{GeneratedThumbnail, ThumbnailGenerator, ThumbnailSize, ThumbnailTarget};
use crate::sanitize::redact_path;
use crate::storage::UploadStorage;

/// Result of a store call.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub file: MediaFileRow,
    /// True when identical content was already stored and reused.
    pub deduplicated: bool,
}

pub struct MediaStore {
    db: Database,
    storage: UploadStorage,
    thumbnailer: Arc<dyn ThumbnailGenerator>,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

impl MediaStore {
    pub fn new(db: Database, storage: UploadStorage, thumbnailer: Arc<dyn ThumbnailGenerator>) -> Self {
        Self {
            db,
            storage,
            thumbnailer,
        }
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len(), mime_type = %mime_type))]
    pub async fn store(
        &self,
        bytes: Vec<u8>,
        original_filename: &str,
        mime_type: &str,
        whatsapp_media_id: Option<&str>,
    ) -> Result<StoredMedia, WabridgeError> {
        let bytes = Arc::new(bytes);
        let file_hash = {
            let bytes = Arc::clone(&bytes);
            blocking(move || Ok(sha256_hex(&bytes))).await?
        };

        if let Some(existing) = media_repo::find_by_hash(&self.db, &file_hash)? {
            return self.reuse(existing, Arc::clone(&bytes)).await;
        }

        let kind = MediaKind::from_mime(mime_type);
        let extension = extension_for(original_filename, mime_type);
        let file_path = {
            let storage = self.storage.clone();
            let bytes = Arc::clone(&bytes);
            blocking(move || storage.store_new(kind.subdir(), &extension, &bytes)).await?
        };

        let probed = probe(kind, &file_path, &bytes).await;

        let new_file = NewMediaFile {
            whatsapp_media_id: whatsapp_media_id.map(str::to_string),
            original_filename: original_filename.to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            mime_type: mime_type.to_string(),
            file_size: bytes.len() as i64,
            width: probed.width,
            height: probed.height,
            duration: probed.duration,
            file_hash: file_hash.clone(),
        };

        let id = match media_repo::insert_processing(&self.db, &new_file) {
            Ok(id) => id,
            Err(e) => {
                self.discard(&file_path);
                if e.is_unique_violation() {
                    if let Some(winner) = self.find_winner(&file_hash, whatsapp_media_id)? {
                        debug!(media_file_id = winner.id, "Lost dedup race, reusing winner");
                        if winner.status == MediaStatus::Failed.as_str()
                            && winner.file_hash == file_hash
                        {
                            return self.reuse(winner, bytes).await;
                        }
                        return Ok(StoredMedia {
                            file: winner,
                            deduplicated: true,
                        });
                    }
                }
                return Err(e.into());
            }
        };

        let file = self.complete(id, &file_path, kind).await?;
        info!(
            media_file_id = id,
            file = %redact_path(&file_path),
            "Media stored"
        );

        Ok(StoredMedia {
            file,
            deduplicated: false,
        })
    }

    /// Returns a row that already holds these bytes. Rows left `processing`
    /// by an interrupted store, or `failed` at finalization, are finished
    /// here before they are handed out.
    async fn reuse(
        &self,
        existing: MediaFileRow,
        bytes: Arc<Vec<u8>>,
    ) -> Result<StoredMedia, WabridgeError> {
        self.heal_missing_file(&existing, bytes).await?;

        if existing.status == MediaStatus::Completed.as_str() {
            debug!(media_file_id = existing.id, "Reusing stored media");
            return Ok(StoredMedia {
                file: existing,
                deduplicated: true,
            });
        }

        warn!(
            media_file_id = existing.id,
            status = %existing.status,
            "Resuming unfinished media file"
        );
        let file_path = PathBuf::from(&existing.file_path);
        let kind = MediaKind::from_mime(&existing.mime_type);
        let file = self.complete(existing.id, &file_path, kind).await?;
        Ok(StoredMedia {
            file,
            deduplicated: true,
        })
    }

    /// Thumbnails plus finalization. A finalization failure leaves the row
    /// `failed` so a later store of the same bytes retries it.
    async fn complete(
        &self,
        id: i64,
        file_path: &Path,
        kind: MediaKind,
    ) -> Result<MediaFileRow, WabridgeError> {
        let thumbnails = if kind.has_thumbnails() {
            self.generate_thumbnails(id, file_path, kind).await
        } else {
            Vec::new()
        };

        if let Err(e) = self.finalize(id, &thumbnails) {
            warn!(media_file_id = id, error = %e, "Failed to finalize media file");
            if let Err(mark_err) = media_repo::mark_failed(&self.db, id, &e.to_string()) {
                warn!(media_file_id = id, error = %mark_err, "Failed to mark media file as failed");
            }
            return Err(e.into());
        }

        debug!(media_file_id = id, thumbnails = thumbnails.len(), "Media file completed");
        let file = media_repo::find_by_id(&self.db, id)?.ok_or(DatabaseError::Sqlite(
            rusqlite::Error::QueryReturnedNoRows,
        ))?;
        Ok(file)
    }

    /// Rewrites the bytes of a known row whose file vanished from disk.
    async fn heal_missing_file(
        &self,
        existing: &MediaFileRow,
        bytes: Arc<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let path = PathBuf::from(&existing.file_path);
        if path.exists() {
            return Ok(());
        }
        warn!(
            media_file_id = existing.id,
            file = %redact_path(&path),
            "Stored media file missing on disk, rewriting"
        );
        let storage = self.storage.clone();
        blocking(move || storage.write_atomic(&path, &bytes)).await
    }

    fn find_winner(
        &self,
        file_hash: &str,
        whatsapp_media_id: Option<&str>,
    ) -> Result<Option<MediaFileRow>, DatabaseError> {
        if let Some(row) = media_repo::find_by_hash(&self.db, file_hash)? {
            return Ok(Some(row));
        }
        match whatsapp_media_id {
            Some(media_id) => media_repo::find_by_whatsapp_media_id(&self.db, media_id),
            None => Ok(None),
        }
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = self.storage.remove(path) {
            warn!(file = %redact_path(path), error = %e, "Failed to remove orphaned media file");
        }
    }

    /// Generates every size; failures are logged and skipped.
    async fn generate_thumbnails(
        &self,
        media_file_id: i64,
        source: &Path,
        kind: MediaKind,
    ) -> Vec<GeneratedThumbnail> {
        let mut targets = Vec::with_capacity(ThumbnailSize::ALL.len());
        for size in ThumbnailSize::ALL {
            match self.storage.thumbnail_path(size.as_str(), media_file_id) {
                Ok(path) => targets.push(ThumbnailTarget { size, path }),
                Err(e) => warn!(media_file_id, size = size.as_str(), error = %e, "Skipping thumbnail"),
            }
        }
        if targets.is_empty() {
            return Vec::new();
        }

        let results = self.thumbnailer.generate(source, kind, &targets).await;
        let mut generated = Vec::new();
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(thumb) => generated.push(thumb),
                Err(e) => {
                    warn!(
                        media_file_id,
                        size = target.size.as_str(),
                        error = %e,
                        "Thumbnail generation failed"
                    );
                    self.discard(&target.path);
                }
            }
        }
        generated
    }

    /// One transaction: thumbnail rows, preview path, `completed`.
    fn finalize(&self, id: i64, thumbnails: &[GeneratedThumbnail]) -> Result<(), DatabaseError> {
        let preview = thumbnails
            .iter()
            .find(|t| t.size == ThumbnailSize::Medium)
            .or_else(|| thumbnails.first())
            .map(|t| t.path.to_string_lossy().into_owned());

        self.db.with_tx(|tx| {
            for thumb in thumbnails {
                media_repo::insert_thumbnail_with(
                    tx,
                    id,
                    &NewThumbnail {
                        size_type: thumb.size.as_str().to_string(),
                        width: i64::from(thumb.width),
                        height: i64::from(thumb.height),
                        file_path: thumb.path.to_string_lossy().into_owned(),
                        file_size: thumb.file_size as i64,
                    },
                )?;
            }
            media_repo::mark_completed_with(tx, id, preview.as_deref())
        })
    }
}
