use crate::{Error, Result};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use utxo_index_primitives::BlockHeight;
use utxo_index_storage::IndexDatabase;

/// Plain-text file holding the height of the last block fully applied to the index.
#[derive(Debug, Clone)]
pub struct SyncCursor {
    path: PathBuf,
}

impl SyncCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored height, `None` if the file does not exist or holds zero.
    pub fn load(&self) -> Result<Option<BlockHeight>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let height = content
            .trim()
            .parse::<BlockHeight>()
            .map_err(|_| Error::InvalidCursor {
                path: self.path.clone(),
                content,
            })?;

        Ok(Some(height).filter(|height| *height > 0))
    }

    /// Replaces the stored height.
    pub fn store(&self, height: BlockHeight) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, height.to_string())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Height of the next block to apply.
    ///
    /// Falls back to the highest height in the index when the file is missing or zero, and to
    /// `start_height` (or genesis) when the index is empty too.
    pub async fn next_height(
        &self,
        db: &mut IndexDatabase,
        start_height: Option<BlockHeight>,
    ) -> Result<BlockHeight> {
        if let Some(height) = self.load()? {
            return Ok(height + 1);
        }

        if let Some(height) = db.max_height().await? {
            tracing::info!(
                height,
                cursor = %self.path.display(),
                "Sync cursor missing, resuming after the highest indexed output"
            );
            return Ok(height + 1);
        }

        Ok(start_height.unwrap_or(0))
    }
}
