//! The asynchronous persistence engine.
//!
//! A [`StorageEngine`] serializes every storage operation onto a single
//! dedicated worker task so that a file-backed or connection-limited
//! backend is never accessed concurrently.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      StorageEngine                           │
//! │  (caller-side handle, Send + Sync)                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  command_tx: mpsc::UnboundedSender<StorageCommand>           │
//! │  shutdown_tx: watch::Sender<bool>                            │
//! └──────────────────────────┬───────────────────────────────────┘
//!                            │ FIFO
//! ┌──────────────────────────▼───────────────────────────────────┐
//! │                      Worker task                             │
//! │  (exclusive owner of the StorageBackend)                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────────┐                       │
//! │  │ Command RX │    │ Shutdown Signal │                       │
//! │  │ (mpsc)     │    │ (watch)         │                       │
//! │  └────────────┘    └─────────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **Serialization**: only the worker ever touches the backend handle.
//! - **FIFO ordering**: operations execute and resolve in submission
//!   order, so a save followed by a load for the same player observes the
//!   save's effects.
//! - **Failure isolation**: a failed operation resolves its own completion
//!   handle with the error; the worker keeps processing the queue.
//!
//! # Data-loss window
//!
//! Queued operations are not durable. If the process is torn down before
//! [`StorageEngine::shutdown`] completes, operations that were submitted
//! but not yet executed are lost. Individual queued operations cannot be
//! cancelled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use crate::backend::{BackendKind, JsonBackend, MySqlBackend, SqliteBackend, StorageBackend};
use crate::codec::RecordCodec;
use crate::config::Config;
use crate::error::StorageError;
use crate::lookup::{CategoryLookup, PatternLookup};
use crate::record::PlayerRecord;

/// A queued storage operation plus its completion handle.
#[derive(Debug)]
enum StorageCommand {
    /// Prepare the backend.
    Initialize {
        response_tx: oneshot::Sender<Result<(), StorageError>>,
    },
    /// Decode persisted state into the record.
    Load {
        record: PlayerRecord,
        response_tx: oneshot::Sender<Result<PlayerRecord, StorageError>>,
    },
    /// Upsert the record.
    Save {
        record: PlayerRecord,
        response_tx: oneshot::Sender<Result<(), StorageError>>,
    },
}

/// Backend-agnostic asynchronous persistence engine.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Dropping the
/// engine without calling [`shutdown`](Self::shutdown) abandons any queued
/// operations.
#[derive(Debug)]
pub struct StorageEngine {
    kind: BackendKind,
    command_tx: mpsc::UnboundedSender<StorageCommand>,
    shutdown_tx: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    shutdown_timeout: Duration,
}

impl StorageEngine {
    /// Spawn a worker task owning `backend` and return the engine handle.
    ///
    /// `shutdown_timeout` bounds how long [`shutdown`](Self::shutdown)
    /// waits for queued operations to drain.
    pub fn new<B>(backend: B, shutdown_timeout: Duration) -> Self
    where
        B: StorageBackend + 'static,
    {
        let kind = backend.kind();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = tokio::spawn(run_worker(
            backend,
            command_rx,
            shutdown_rx,
            Arc::clone(&pending),
        ));

        Self {
            kind,
            command_tx,
            shutdown_tx,
            worker: Mutex::new(Some(worker)),
            pending,
            shutdown_timeout,
        }
    }

    /// Construct an engine for the backend selected by `config`.
    ///
    /// The lookups are handed to the decode step; they are read exclusively
    /// by the worker during loads.
    pub fn from_config(
        config: &Config,
        categories: Arc<dyn CategoryLookup>,
        patterns: Arc<dyn PatternLookup>,
    ) -> Self {
        let codec = Arc::new(RecordCodec::new(
            categories,
            patterns,
            config.default_activation_mode,
            config.default_pattern_id.clone(),
        ));
        let timeout = Duration::from_millis(config.shutdown_timeout_ms);

        match config.backend {
            BackendKind::Sqlite => {
                Self::new(SqliteBackend::new(&config.database_path, codec), timeout)
            }
            BackendKind::MySql => {
                // Presence of the URL is validated by Config::from_env.
                let url = config.mysql_url.clone().unwrap_or_default();
                Self::new(MySqlBackend::new(url, codec), timeout)
            }
            BackendKind::Json => {
                Self::new(JsonBackend::new(&config.json_data_dir, codec), timeout)
            }
        }
    }

    /// The kind of backend this engine drives.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Prepare the backend (create schema or data directory if absent).
    ///
    /// Must complete successfully before loads and saves can succeed.
    /// Operations submitted while initialization is still queued preserve
    /// their submission order behind it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InitializationFailed`] if setup failed, or
    /// [`StorageError::WorkerStopped`] after shutdown.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.submit(StorageCommand::Initialize { response_tx })?;
        response_rx.await.map_err(|_| StorageError::WorkerStopped)?
    }

    /// Load persisted state for the record's player into the record.
    ///
    /// A player with no persisted state is not an error; the record keeps
    /// its current (default) values. On success the record's dirty flag is
    /// clear.
    ///
    /// # Errors
    ///
    /// Returns an operation-level [`StorageError`] on backend failure, or
    /// [`StorageError::WorkerStopped`] after shutdown. The record is left
    /// untouched on failure.
    pub async fn load(&self, record: &mut PlayerRecord) -> Result<(), StorageError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.submit(StorageCommand::Load {
            record: record.clone(),
            response_tx,
        })?;

        let loaded = response_rx.await.map_err(|_| StorageError::WorkerStopped)??;
        *record = loaded;
        Ok(())
    }

    /// Persist the record if it is dirty.
    ///
    /// A clean record resolves immediately without touching the queue or
    /// the backend. On confirmed success the engine clears the record's
    /// dirty flag; on failure the flag is left set so the caller may retry.
    ///
    /// # Errors
    ///
    /// Returns an operation-level [`StorageError`] on backend failure, or
    /// [`StorageError::WorkerStopped`] after shutdown.
    pub async fn save(&self, record: &mut PlayerRecord) -> Result<(), StorageError> {
        if !record.is_dirty() {
            return Ok(());
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.submit(StorageCommand::Save {
            record: record.clone(),
            response_tx,
        })?;

        response_rx.await.map_err(|_| StorageError::WorkerStopped)??;
        record.mark_clean();
        Ok(())
    }

    /// Signal that no further operations will be submitted, wait (bounded)
    /// for the queue to drain, and release backend resources.
    ///
    /// Operations already queued when shutdown is signalled all execute
    /// before the worker closes the backend. A second call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ShutdownTimedOut`] with the number of
    /// unfinished operations if the bounded wait elapses first. The
    /// condition is noteworthy (unflushed data) but not fatal.
    pub async fn shutdown(&self) -> Result<(), StorageError> {
        let _ = self.shutdown_tx.send(true);

        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(self.shutdown_timeout, worker).await {
            Ok(join_result) => {
                if join_result.is_err() {
                    tracing::error!("Storage worker task failed during shutdown");
                }
                Ok(())
            }
            Err(_) => {
                let pending = self.pending.load(Ordering::Acquire);
                tracing::warn!(
                    pending,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Shutdown wait elapsed with operations still queued"
                );
                Err(StorageError::ShutdownTimedOut { pending })
            }
        }
    }

    fn submit(&self, command: StorageCommand) -> Result<(), StorageError> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.command_tx.send(command).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            StorageError::WorkerStopped
        })
    }
}

/// The worker loop: the only code that ever touches the backend.
async fn run_worker<B: StorageBackend>(
    mut backend: B,
    mut command_rx: mpsc::UnboundedReceiver<StorageCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
    pending: Arc<AtomicUsize>,
) {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(command) => execute(&mut backend, command, &pending).await,
                // Every engine handle is gone; nothing more can arrive.
                None => break,
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    // Drain guarantee: everything queued before the stop signal still
    // executes. Closing the channel lets recv() return the buffered
    // commands and then None.
    command_rx.close();
    while let Some(command) = command_rx.recv().await {
        execute(&mut backend, command, &pending).await;
    }

    backend.close().await;
    tracing::debug!("Storage worker stopped");
}

/// Execute one command and resolve its completion handle.
///
/// Backend failures become the failure value of the handle and never
/// escape the worker; an error escaping here would silently stop all
/// future persistence for this engine instance.
async fn execute<B: StorageBackend>(
    backend: &mut B,
    command: StorageCommand,
    pending: &AtomicUsize,
) {
    match command {
        StorageCommand::Initialize { response_tx } => {
            let result = backend.initialize().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Backend initialization failed");
            }
            // The caller may have gone away; that is not the worker's
            // problem.
            let _ = response_tx.send(result);
        }
        StorageCommand::Load { record, response_tx } => {
            let player = record.player_id();
            let result = backend.load(record).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, %player, "Load failed");
            }
            let _ = response_tx.send(result);
        }
        StorageCommand::Save { record, response_tx } => {
            let player = record.player_id();
            let result = backend.save(&record).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, %player, "Save failed");
            }
            let _ = response_tx.send(result);
        }
    }

    pending.fetch_sub(1, Ordering::AcqRel);
}
