use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StorageError;

const THUMBNAILS_DIR: &str = "thumbnails";

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// The uploads tree: `{images,videos,audio,documents}/` for primaries and
/// `thumbnails/{small,medium,large}/` for previews.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Writes `content` under `subdir` with a fresh `<unix-millis>-<random>.<ext>`
    /// name and returns the final path.
    ///
    /// Bytes go to a hidden temp file first and are renamed into place, so
    /// readers never observe a partially written file.
    pub fn store_new(
        &self,
        subdir: &str,
        extension: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let dir_path = self.root.join(subdir);
        ensure_directory(&dir_path)?;

        for _ in 0..16 {
            let candidate = dir_path.join(generate_filename(extension));
            if std::fs::symlink_metadata(&candidate).is_ok() {
                continue;
            }
            self.write_atomic(&candidate, content)?;
            return Ok(candidate);
        }

        Err(StorageError::FileExists(dir_path))
    }

    /// Replaces whatever is at `path` with `content`, atomically.
    pub fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        let parent = path.parent().unwrap_or(&self.root);
        ensure_directory(parent)?;

        let temp_path = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| StorageError::WriteFile {
                path: temp_path.clone(),
                source: e,
            })?;

        let written = file.write_all(content).and_then(|_| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            });
        }

        if let Err(e) = move_file(&temp_path, path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    /// Path for a thumbnail of `media_file_id` at the given size name.
    /// Creates the size directory.
    pub fn thumbnail_path(&self, size: &str, media_file_id: i64) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(THUMBNAILS_DIR).join(size);
        ensure_directory(&dir)?;
        Ok(dir.join(format!("{}_{}.jpg", media_file_id, size)))
    }

    /// Removes a file if present. Missing files are not an error.
    pub fn remove(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn generate_filename(extension: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        &random[..12],
        extension
    )
}
