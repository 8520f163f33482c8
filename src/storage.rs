//! Atomic on-disk document storage.
//!
//! Uploads are written under `{root}/{owner_id}/{document_id}_{filename}`.
//! Bytes first land in a hidden `.upload-*.tmp` file in the destination
//! directory and are renamed into place only after the whole stream has been
//! copied and synced, so a reader of the final path sees either nothing or
//! the complete file. Temp files are removed on every failure path, including
//! when the write future is dropped mid-copy.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::StorageError;
use crate::models::OwnerId;

/// Longest single path component accepted by common filesystems, in bytes.
pub const MAX_FILE_NAME: usize = 255;

/// Longest extension kept when a stored file name has to be shortened.
const MAX_KEPT_EXTENSION: usize = 16;

/// Filesystem-backed store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct AtomicStore {
    root: PathBuf,
}

impl AtomicStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative storage path for a document, always `/`-separated.
    ///
    /// `filename` must already be sanitized. The file name component is
    /// `{document_id}_{filename}`, with the filename's stem shortened so the
    /// whole component fits in [`MAX_FILE_NAME`] bytes.
    pub fn relative_path(owner: &OwnerId, document_id: &str, filename: &str) -> String {
        format!("{}/{}", owner, stored_file_name(document_id, filename))
    }

    /// Resolve a relative storage path against the root.
    pub fn absolute_path(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.clone();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StorageError::InvalidPath(relative.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Copy `reader` to `relative` atomically, returning the number of bytes
    /// written.
    ///
    /// At most `max_bytes` are accepted; a longer stream fails with
    /// [`StorageError::TooLarge`] and nothing appears at the destination.
    pub async fn write<R: AsyncRead + Unpin>(
        &self,
        relative: &str,
        reader: R,
        max_bytes: u64,
    ) -> Result<u64, StorageError> {
        let dest = self.absolute_path(relative)?;
        let dir = dest
            .parent()
            .ok_or_else(|| StorageError::InvalidPath(relative.to_string()))?;

        fs::create_dir_all(dir).await?;

        let temp = TempFile::new(dir.join(format!(".upload-{}.tmp", Uuid::new_v4().simple())));
        let written = copy_capped(temp.path(), reader, max_bytes).await?;

        fs::rename(temp.path(), &dest).await?;
        temp.persisted();

        tracing::debug!(path = %dest.display(), bytes = written, "stored upload");
        Ok(written)
    }

    /// Delete a stored document file.
    pub async fn remove(&self, relative: &str) -> Result<(), StorageError> {
        let path = self.absolute_path(relative)?;
        fs::remove_file(path).await?;
        Ok(())
    }
}

fn stored_file_name(document_id: &str, filename: &str) -> String {
    let budget = MAX_FILE_NAME.saturating_sub(document_id.len() + 1);
    if filename.len() <= budget {
        return format!("{}_{}", document_id, filename);
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(i) if i > 0 && filename.len() - i <= MAX_KEPT_EXTENSION => filename.split_at(i),
        _ => (filename, ""),
    };
    let stem = truncate_bytes(stem, budget.saturating_sub(ext.len()));
    format!("{}_{}{}", document_id, stem, ext)
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}

async fn copy_capped<R: AsyncRead + Unpin>(
    path: &Path,
    reader: R,
    max_bytes: u64,
) -> Result<u64, StorageError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    // One byte past the cap is enough to tell "exactly max" from "more".
    let mut limited = reader.take(max_bytes.saturating_add(1));
    let written = tokio::io::copy(&mut limited, &mut file).await?;
    if written > max_bytes {
        return Err(StorageError::TooLarge { max: max_bytes });
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

/// Removes the temp file on drop unless it was renamed into place.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persisted(mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
