//! Watermark persistence.
//!
//! The watermark is the id of the last message whose dispatch was attempted.
//! It is a single integer stored as decimal text and overwritten after every
//! processed record, so the write path must never leave a torn value behind:
//! [`FileWatermarkStore::save`] writes to a sibling temp file, fsyncs, then
//! renames over the target.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Persistence seam for the pipeline's watermark.
///
/// The orchestrator depends only on this trait; production uses
/// [`FileWatermarkStore`], tests swap in an in-memory implementation.
pub trait WatermarkStore: Send + Sync {
    /// Load the persisted watermark. `Ok(None)` when no usable watermark
    /// exists yet; the caller seeds one from the message store.
    fn load(&self) -> StoreResult<Option<i64>>;

    /// Durably overwrite the watermark. Must be atomic: a crash mid-save
    /// leaves either the old or the new value, never a partial write.
    fn save(&self, id: i64) -> StoreResult<()>;
}

/// File-backed watermark store (decimal text in a standalone file).
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store persisting to `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::WatermarkIo {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl WatermarkStore for FileWatermarkStore {
    /// Fails soft: an absent file is simply "no watermark yet", and an
    /// unparsable one is reported but treated the same, so a damaged file
    /// re-seeds instead of wedging the pipeline.
    fn load(&self) -> StoreResult<Option<i64>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no watermark file yet");
                return Ok(None);
            }
            Err(e) => return Err(self.io_err(e)),
        };

        match content.trim().parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(
                    path = %self.path.display(),
                    content = content.trim(),
                    "watermark file is corrupt, will re-seed"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, id: i64) -> StoreResult<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut f = std::fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
            f.write_all(id.to_string().as_bytes())
                .map_err(|e| self.io_err(e))?;
            f.sync_all().map_err(|e| self.io_err(e))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(watermark = id, path = %self.path.display(), "watermark persisted");
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
