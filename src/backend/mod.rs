//! Storage backends.
//!
//! A backend maps [`PlayerRecord`](crate::record::PlayerRecord) fields to a
//! physical format and translates backend-native failures into the
//! [`StorageError`] taxonomy. Backends are never touched by callers
//! directly: the engine moves the backend into its worker task, which is the
//! only code that ever holds the connection or file handle. None of the
//! implementations here are safe for concurrent access and none of them
//! need to be.
//!
//! Implementations:
//! - [`SqliteBackend`]: embedded file database
//! - [`MySqlBackend`]: networked relational database
//! - [`JsonBackend`]: one flat JSON file per player

mod json;
mod mysql;
mod sqlite;

pub use json::JsonBackend;
pub use mysql::MySqlBackend;
pub use sqlite::SqliteBackend;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::PlayerRecord;

/// The supported kinds of persistent storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Embedded file database.
    #[default]
    Sqlite,
    /// Networked relational database.
    MySql,
    /// One flat JSON file per player.
    Json,
}

impl BackendKind {
    /// The stable configuration identifier of this kind.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Json => "json",
        }
    }

    /// Parse a configuration identifier, case-insensitively.
    ///
    /// Returns `None` for unrecognized identifiers; configuration falls
    /// back to the default kind rather than failing startup.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::Sqlite, Self::MySql, Self::Json]
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(id))
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// The operations every storage backend implements.
///
/// Executed exclusively by the engine's worker task, one operation at a
/// time, in submission order. Implementations are free to assume they are
/// never called concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send {
    /// The kind of persistent storage this backend provides.
    fn kind(&self) -> BackendKind;

    /// Prepare the backend: open connections, create the schema or data
    /// directory if absent. Must complete successfully before any load or
    /// save can succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InitializationFailed`] if setup fails; the
    /// backend is unusable until a later `initialize` succeeds.
    async fn initialize(&mut self) -> Result<(), StorageError>;

    /// Look up persisted state for the record's player and decode it into
    /// the record. A player with no persisted state is not an error: the
    /// record is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an operation-level [`StorageError`] only for backend
    /// failures (I/O, connection, malformed data file).
    async fn load(&mut self, record: PlayerRecord) -> Result<PlayerRecord, StorageError>;

    /// Encode the record and upsert it: insert if absent, overwrite all
    /// value fields together if present. The dirty flag is the engine's
    /// concern; backends persist whatever they are handed.
    ///
    /// # Errors
    ///
    /// Returns an operation-level [`StorageError`] on backend failure.
    async fn save(&mut self, record: &PlayerRecord) -> Result<(), StorageError>;

    /// Release backend resources. Called once by the worker after the
    /// queue has drained.
    async fn close(&mut self);
}
