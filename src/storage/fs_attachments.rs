//! Filesystem attachment store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::error::{ArgumentError, RecordsResult, StorageError};
use crate::core::store::AttachmentStore;

/// Writes each attachment to `<root>/<key>`
#[derive(Debug, Clone)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root
    ///
    /// Keys are record ids; anything that could escape the root is refused.
    fn path_for(&self, key: &str) -> RecordsResult<PathBuf> {
        let safe = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !safe {
            return Err(ArgumentError::InvalidParameter {
                parameter: "id".to_string(),
                message: format!("'{}' cannot be used as an attachment key", key),
            }
            .into());
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn write(&self, key: &str, contents: &[u8]) -> RecordsResult<()> {
        let path = self.path_for(key)?;
        let write_failed = |e: std::io::Error| StorageError::WriteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&self.root).await.map_err(write_failed)?;
        fs::write(&path, contents).await.map_err(write_failed)?;

        tracing::debug!(path = %path.display(), bytes = contents.len(), "attachment stored");
        Ok(())
    }

    async fn read(&self, key: &str) -> RecordsResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()),
        }
    }
}
