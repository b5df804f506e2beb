//! Asynchronous per-player preference persistence.
//!
//! This crate persists per-player preference records — an activation mode,
//! a set of disabled tool categories, and a selected mining pattern —
//! across sessions, backed by interchangeable storage engines (embedded
//! `SQLite` file, networked `MySQL`, flat JSON files).
//!
//! # Features
//!
//! - Backend-agnostic [`engine::StorageEngine`] with non-blocking load/save
//! - All storage operations serialized onto a single dedicated worker, so
//!   non-concurrent backends are never accessed concurrently
//! - Strict FIFO ordering: a save followed by a load observes the save
//! - Graceful shutdown with a bounded drain of queued operations
//! - Lenient decoding that tolerates registry changes in persisted data
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  load/save   ┌───────────────┐  FIFO   ┌─────────────┐
//! │ Command layer│─────────────▶│ StorageEngine │────────▶│ Worker task │
//! │ (consumer)   │◀─────────────│  (handle)     │         │ + backend   │
//! └──────────────┘  completion  └───────────────┘         └──────┬──────┘
//!                                                                │
//!                                                   SQLite / MySQL / JSON
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use prefstore::backend::SqliteBackend;
//! use prefstore::codec::RecordCodec;
//! use prefstore::engine::StorageEngine;
//! use prefstore::lookup::StaticLookup;
//! use prefstore::record::{ActivationMode, PlayerRecord};
//! use uuid::Uuid;
//!
//! # async fn run() -> Result<(), prefstore::error::StorageError> {
//! let codec = Arc::new(RecordCodec::new(
//!     Arc::new(StaticLookup::new(["ORES", "LOGS"])),
//!     Arc::new(StaticLookup::new(["default"])),
//!     ActivationMode::Sneak,
//!     Some("default".to_string()),
//! ));
//!
//! let engine = StorageEngine::new(
//!     SqliteBackend::new("./data/players.db", codec),
//!     Duration::from_secs(5),
//! );
//! engine.initialize().await?;
//!
//! let mut record = PlayerRecord::new(Uuid::new_v4());
//! engine.load(&mut record).await?;
//!
//! record.disable_category("ORES");
//! engine.save(&mut record).await?;
//!
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Durability caveat
//!
//! Queued operations are memory-only until executed. If the process is
//! torn down before [`engine::StorageEngine::shutdown`] drains the queue,
//! the unexecuted operations are lost.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod record;
