use async_trait::async_trait;
use std::path::{Path, PathBuf};
use yatra_order::{BookingDraft, DraftPersistence, PersistenceError};

use crate::session_store::write_atomic;

/// Booking draft saved as JSON so a restart can resume at review
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(e: std::io::Error) -> PersistenceError {
    PersistenceError::Io(e.to_string())
}

#[async_trait]
impl DraftPersistence for FileDraftStore {
    async fn save(&self, draft: &BookingDraft) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(draft).map_err(|e| PersistenceError::Io(e.to_string()))?;
        write_atomic(&self.path, &bytes).await.map_err(io_error)?;
        tracing::debug!(path = %self.path.display(), "Booking draft saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<BookingDraft>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}
