//! `SQLite` storage backend.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::codec::{RecordCodec, RecordRow};
use crate::error::StorageError;
use crate::record::PlayerRecord;

use super::{BackendKind, StorageBackend};

const CREATE_TABLE_PLAYERS: &str = "\
CREATE TABLE IF NOT EXISTS player_data (
    player_uuid         TEXT PRIMARY KEY,
    activation_mode     TEXT,
    disabled_categories TEXT,
    pattern_id          TEXT
)";

// All value columns are replaced together; there is no partial-column
// update. The conflict clause makes the statement itself the upsert.
const UPSERT_PLAYER_DATA: &str = "\
INSERT INTO player_data (player_uuid, activation_mode, disabled_categories, pattern_id)
VALUES (?, ?, ?, ?)
ON CONFLICT (player_uuid) DO UPDATE SET
    activation_mode = excluded.activation_mode,
    disabled_categories = excluded.disabled_categories,
    pattern_id = excluded.pattern_id";

const SELECT_PLAYER_DATA: &str = "\
SELECT activation_mode, disabled_categories, pattern_id
FROM player_data WHERE player_uuid = ?";

/// Embedded file database backend.
///
/// The pool is created lazily during [`StorageBackend::initialize`] so that
/// a misconfigured path surfaces as an initialization failure rather than a
/// construction panic.
#[derive(Debug)]
pub struct SqliteBackend {
    // None = in-memory database (tests).
    path: Option<PathBuf>,
    pool: Option<SqlitePool>,
    codec: Arc<RecordCodec>,
}

impl SqliteBackend {
    /// Create a backend for the database file at `path`.
    ///
    /// The file and its parent directories are created during
    /// `initialize` if absent.
    pub fn new(path: impl Into<PathBuf>, codec: Arc<RecordCodec>) -> Self {
        Self {
            path: Some(path.into()),
            pool: None,
            codec,
        }
    }

    /// Create an in-memory backend for testing.
    #[must_use]
    pub const fn in_memory(codec: Arc<RecordCodec>) -> Self {
        Self {
            path: None,
            pool: None,
            codec,
        }
    }

    fn pool(&self) -> Result<&SqlitePool, StorageError> {
        self.pool.as_ref().ok_or_else(|| StorageError::ConnectionFailed {
            message: "backend not initialized".to_string(),
        })
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, StorageError> {
        match &self.path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::InitializationFailed {
                            message: format!("Failed to create database directory: {e}"),
                        }
                    })?;
                }

                let options =
                    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
                        .map_err(|e| StorageError::InitializationFailed {
                            message: format!("Invalid database path: {e}"),
                        })?;
                Ok(options
                    .journal_mode(SqliteJournalMode::Wal)
                    .create_if_missing(true))
            }
            None => SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::InitializationFailed {
                    message: format!("Invalid memory database options: {e}"),
                }
            }),
        }
    }

    fn query_error(query: &str, message: String) -> StorageError {
        StorageError::QueryFailed {
            query: query.to_string(),
            message,
        }
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn initialize(&mut self) -> Result<(), StorageError> {
        let options = self.connect_options()?;

        // One connection: access is already serialized by the worker, and
        // an in-memory database exists per connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::InitializationFailed {
                message: format!("Failed to connect to database: {e}"),
            })?;

        sqlx::query(CREATE_TABLE_PLAYERS)
            .execute(&pool)
            .await
            .map_err(|e| StorageError::InitializationFailed {
                message: format!("Failed to create player_data table: {e}"),
            })?;

        self.pool = Some(pool);
        Ok(())
    }

    async fn load(&mut self, mut record: PlayerRecord) -> Result<PlayerRecord, StorageError> {
        let pool = self.pool()?;

        let row = sqlx::query(SELECT_PLAYER_DATA)
            .bind(record.player_id().to_string())
            .fetch_optional(pool)
            .await
            .map_err(|e| Self::query_error("SELECT player_data", format!("{e}")))?;

        if let Some(row) = row {
            let stored = RecordRow {
                activation_mode: row.get("activation_mode"),
                disabled_categories: row.get("disabled_categories"),
                pattern_id: row.get("pattern_id"),
            };
            self.codec.decode(&mut record, &stored);
        }

        Ok(record)
    }

    async fn save(&mut self, record: &PlayerRecord) -> Result<(), StorageError> {
        let row = self.codec.encode(record)?;
        let pool = self.pool()?;

        sqlx::query(UPSERT_PLAYER_DATA)
            .bind(record.player_id().to_string())
            .bind(row.activation_mode)
            .bind(row.disabled_categories)
            .bind(row.pattern_id)
            .execute(pool)
            .await
            .map_err(|e| Self::query_error("INSERT player_data", format!("{e}")))?;

        Ok(())
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }
}
