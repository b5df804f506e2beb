//! Flat-file JSON storage backend.
//!
//! One `<player_uuid>.json` file per player under a data directory. Saves
//! replace the file atomically (write to a temporary file in the same
//! directory, then rename over the target), so a crash mid-save leaves the
//! previous state intact rather than a truncated file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::codec::{RecordCodec, RecordRow};
use crate::error::StorageError;
use crate::record::PlayerRecord;

use super::{BackendKind, StorageBackend};

/// Flat structured-file backend.
#[derive(Debug)]
pub struct JsonBackend {
    dir: PathBuf,
    codec: Arc<RecordCodec>,
}

impl JsonBackend {
    /// Create a backend storing player files under `dir`.
    ///
    /// The directory is created during `initialize` if absent.
    pub fn new(dir: impl Into<PathBuf>, codec: Arc<RecordCodec>) -> Self {
        Self {
            dir: dir.into(),
            codec,
        }
    }

    fn player_file(&self, player_id: Uuid) -> PathBuf {
        self.dir.join(format!("{player_id}.json"))
    }

    fn io_error(context: &str, message: impl std::fmt::Display) -> StorageError {
        StorageError::Io {
            message: format!("{context}: {message}"),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    async fn initialize(&mut self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::InitializationFailed {
            message: format!("Failed to create data directory: {e}"),
        })
    }

    async fn load(&mut self, mut record: PlayerRecord) -> Result<PlayerRecord, StorageError> {
        let path = self.player_file(record.player_id());

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            // No file means no persisted state; not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(record),
            Err(e) => return Err(Self::io_error("Failed to read player file", e)),
        };

        let stored: RecordRow = serde_json::from_slice(&bytes)
            .map_err(|e| Self::io_error("Malformed player file", e))?;

        self.codec.decode(&mut record, &stored);
        Ok(record)
    }

    async fn save(&mut self, record: &PlayerRecord) -> Result<(), StorageError> {
        let row = self.codec.encode(record)?;
        let bytes = serde_json::to_vec_pretty(&row)
            .map_err(|e| Self::io_error("Failed to serialize record", e))?;

        let mut file = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Self::io_error("Failed to create temporary file", e))?;
        file.write_all(&bytes)
            .map_err(|e| Self::io_error("Failed to write player file", e))?;
        file.persist(self.player_file(record.player_id()))
            .map_err(|e| Self::io_error("Failed to replace player file", e))?;

        Ok(())
    }

    async fn close(&mut self) {
        // No held resources; files are opened per operation.
    }
}
