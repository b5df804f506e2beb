//! End-to-end tests of the persistence engine against real backends and
//! purpose-built test backends.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prefstore::backend::{BackendKind, JsonBackend, SqliteBackend, StorageBackend};
use prefstore::codec::RecordCodec;
use prefstore::engine::StorageEngine;
use prefstore::error::StorageError;
use prefstore::lookup::StaticLookup;
use prefstore::record::{ActivationMode, PlayerRecord};
use uuid::Uuid;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn codec_for(categories: &[&str]) -> Arc<RecordCodec> {
    Arc::new(RecordCodec::new(
        Arc::new(StaticLookup::new(categories.iter().copied())),
        Arc::new(StaticLookup::new(["default", "tunnel"])),
        ActivationMode::Sneak,
        Some("default".to_string()),
    ))
}

fn codec() -> Arc<RecordCodec> {
    codec_for(&["ORES", "LOGS", "AXES", "PICKAXES"])
}

async fn sqlite_engine() -> StorageEngine {
    let engine = StorageEngine::new(SqliteBackend::in_memory(codec()), TEST_TIMEOUT);
    engine.initialize().await.expect("initialize");
    engine
}

/// Backend that counts calls and persists nothing. Used to prove which
/// operations reach the backend at all.
#[derive(Default)]
struct CountingBackend {
    saves: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl StorageBackend for CountingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn initialize(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load(&mut self, record: PlayerRecord) -> Result<PlayerRecord, StorageError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn save(&mut self, _record: &PlayerRecord) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// In-memory backend with a configurable per-operation delay. Used to keep
/// operations queued while shutdown is signalled.
struct SlowBackend {
    delay: Duration,
    rows: HashMap<Uuid, PlayerRecord>,
    completed: Arc<AtomicUsize>,
}

impl SlowBackend {
    fn new(delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let completed = Arc::new(AtomicUsize::new(0));
        (
            Self {
                delay,
                rows: HashMap::new(),
                completed: Arc::clone(&completed),
            },
            completed,
        )
    }
}

#[async_trait]
impl StorageBackend for SlowBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    async fn initialize(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load(&mut self, record: PlayerRecord) -> Result<PlayerRecord, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .get(&record.player_id())
            .cloned()
            .unwrap_or(record))
    }

    async fn save(&mut self, record: &PlayerRecord) -> Result<(), StorageError> {
        tokio::time::sleep(self.delay).await;
        self.rows.insert(record.player_id(), record.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {}
}

// Property 1: a clean record's save resolves successfully with zero
// backend mutations.
#[tokio::test]
async fn clean_save_resolves_without_backend_access() {
    let backend = CountingBackend::default();
    let saves = Arc::clone(&backend.saves);
    let engine = StorageEngine::new(backend, TEST_TIMEOUT);

    let mut record = PlayerRecord::new(Uuid::new_v4());
    engine.save(&mut record).await.expect("clean save");

    engine.shutdown().await.expect("shutdown");
    assert_eq!(saves.load(Ordering::SeqCst), 0);
}

// Property 2: save followed by load yields an equal record on every field.
#[tokio::test]
async fn save_load_round_trip_sqlite() {
    let engine = sqlite_engine().await;
    let player_id = Uuid::new_v4();

    let mut record = PlayerRecord::new(player_id);
    record.set_activation_mode(ActivationMode::Client);
    record.disable_category("ORES");
    record.disable_category("AXES");
    record.set_pattern(Some("tunnel".to_string()));
    engine.save(&mut record).await.expect("save");

    let mut loaded = PlayerRecord::new(player_id);
    engine.load(&mut loaded).await.expect("load");

    assert_eq!(loaded, record);
    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn save_load_round_trip_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = StorageEngine::new(JsonBackend::new(dir.path(), codec()), TEST_TIMEOUT);
    engine.initialize().await.expect("initialize");

    let player_id = Uuid::new_v4();
    let mut record = PlayerRecord::new(player_id);
    record.set_activation_mode(ActivationMode::Always);
    record.disable_category("LOGS");
    engine.save(&mut record).await.expect("save");

    let mut loaded = PlayerRecord::new(player_id);
    engine.load(&mut loaded).await.expect("load");

    assert_eq!(loaded, record);
    engine.shutdown().await.expect("shutdown");
}

// Property 3: a category dropped from the registry disappears from the
// decoded set, with no other field affected.
#[tokio::test]
async fn dropped_category_is_skipped_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let player_id = Uuid::new_v4();

    let engine = StorageEngine::new(
        JsonBackend::new(dir.path(), codec_for(&["ORES", "LOGS"])),
        TEST_TIMEOUT,
    );
    engine.initialize().await.expect("initialize");

    let mut record = PlayerRecord::new(player_id);
    record.set_activation_mode(ActivationMode::Always);
    record.disable_category("ORES");
    record.disable_category("LOGS");
    record.set_pattern(Some("tunnel".to_string()));
    engine.save(&mut record).await.expect("save");
    engine.shutdown().await.expect("shutdown");

    // Same data directory, smaller registry: LOGS no longer exists.
    let engine = StorageEngine::new(
        JsonBackend::new(dir.path(), codec_for(&["ORES"])),
        TEST_TIMEOUT,
    );
    engine.initialize().await.expect("initialize");

    let mut loaded = PlayerRecord::new(player_id);
    engine.load(&mut loaded).await.expect("load");

    let ids: Vec<&str> = loaded
        .disabled_categories()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(ids, ["ORES"]);
    assert_eq!(loaded.activation_mode(), ActivationMode::Always);
    assert_eq!(loaded.pattern_id(), Some("tunnel"));

    engine.shutdown().await.expect("shutdown");
}

// Property 4: an unknown persisted activation mode decodes to the
// configured default instead of failing the load.
#[tokio::test]
async fn unknown_activation_mode_falls_back_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let player_id = Uuid::new_v4();

    std::fs::write(
        dir.path().join(format!("{player_id}.json")),
        br#"{"activation_mode": "DANCING"}"#,
    )
    .expect("write row");

    let engine = StorageEngine::new(JsonBackend::new(dir.path(), codec()), TEST_TIMEOUT);
    engine.initialize().await.expect("initialize");

    let mut loaded = PlayerRecord::new(player_id);
    engine.load(&mut loaded).await.expect("load");

    assert_eq!(loaded.activation_mode(), ActivationMode::Sneak);
    assert!(!loaded.is_dirty());
    engine.shutdown().await.expect("shutdown");
}

// Property 5: concurrent callers submitting for different players all
// resolve with per-player-correct data.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_resolve_with_correct_data() {
    let categories: Vec<String> = (0..8).map(|i| format!("CAT{i}")).collect();
    let category_refs: Vec<&str> = categories.iter().map(String::as_str).collect();

    let dir = tempfile::tempdir().expect("tempdir");
    let engine = Arc::new(StorageEngine::new(
        JsonBackend::new(dir.path(), codec_for(&category_refs)),
        TEST_TIMEOUT,
    ));
    engine.initialize().await.expect("initialize");

    let mut tasks = Vec::new();
    for i in 0..32_usize {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let player_id = Uuid::new_v4();
            let mut record = PlayerRecord::new(player_id);
            record.disable_category(format!("CAT{}", i % 8));
            engine.save(&mut record).await.expect("save");

            let mut loaded = PlayerRecord::new(player_id);
            engine.load(&mut loaded).await.expect("load");
            assert!(loaded.is_category_disabled(&format!("CAT{}", i % 8)));
            assert_eq!(loaded.disabled_categories().len(), 1);
        }));
    }

    for task in tasks {
        task.await.expect("task");
    }
    engine.shutdown().await.expect("shutdown");
}

// Property 6: the full never-persisted → mutate → save → reload scenario.
#[tokio::test]
async fn fresh_player_scenario() {
    let engine = sqlite_engine().await;
    let player_id = Uuid::new_v4();

    let mut record = PlayerRecord::new(player_id);
    engine.load(&mut record).await.expect("first load");
    assert_eq!(record.activation_mode(), ActivationMode::Sneak);
    assert!(record.disabled_categories().is_empty());
    assert!(record.pattern_id().is_none());
    assert!(!record.is_dirty());

    record.disable_category("ORES");
    record.disable_category("LOGS");
    assert!(record.is_dirty());
    engine.save(&mut record).await.expect("save");
    assert!(!record.is_dirty());

    let mut fresh = PlayerRecord::new(player_id);
    engine.load(&mut fresh).await.expect("second load");
    let ids: Vec<&str> = fresh
        .disabled_categories()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(ids, ["LOGS", "ORES"]);

    engine.shutdown().await.expect("shutdown");
}

// Property 7: shutdown drains operations already queued and reports no
// timeout condition.
#[tokio::test]
async fn shutdown_drains_queued_operations() {
    let (backend, completed) = SlowBackend::new(Duration::from_millis(50));
    let engine = Arc::new(StorageEngine::new(backend, TEST_TIMEOUT));

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let mut record = PlayerRecord::new(Uuid::new_v4());
            record.disable_category("ORES");
            engine.save(&mut record).await
        }));
    }

    // Let the saves enqueue before signalling shutdown.
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.shutdown().await.expect("shutdown without timeout");

    for task in tasks {
        task.await.expect("task").expect("save resolved");
    }
    assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn shutdown_reports_timeout_when_queue_cannot_drain() {
    let (backend, _completed) = SlowBackend::new(Duration::from_millis(300));
    let engine = Arc::new(StorageEngine::new(backend, Duration::from_millis(100)));

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let mut record = PlayerRecord::new(Uuid::new_v4());
            record.disable_category("ORES");
            let _ = engine.save(&mut record).await;
        }));
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    let result = engine.shutdown().await;

    match result {
        Err(StorageError::ShutdownTimedOut { pending }) => assert!(pending >= 1),
        other => panic!("expected shutdown timeout, got {other:?}"),
    }
}

// Failure isolation at the engine boundary: a backend that rejects one
// operation keeps serving the next.
struct FlakyBackend {
    fail_next: bool,
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    async fn initialize(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn load(&mut self, record: PlayerRecord) -> Result<PlayerRecord, StorageError> {
        Ok(record)
    }

    async fn save(&mut self, _record: &PlayerRecord) -> Result<(), StorageError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(StorageError::Io {
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) {}
}

#[tokio::test]
async fn one_failure_does_not_poison_the_queue() {
    let engine = StorageEngine::new(FlakyBackend { fail_next: true }, TEST_TIMEOUT);

    let mut record = PlayerRecord::new(Uuid::new_v4());
    record.disable_category("ORES");

    let first = engine.save(&mut record).await;
    assert!(matches!(first, Err(StorageError::Io { .. })));
    assert!(record.is_dirty());

    engine.save(&mut record).await.expect("retry succeeds");
    assert!(!record.is_dirty());

    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn operations_after_shutdown_are_rejected() {
    let engine = sqlite_engine().await;
    engine.shutdown().await.expect("shutdown");

    let mut record = PlayerRecord::new(Uuid::new_v4());
    record.disable_category("ORES");
    assert_eq!(
        engine.save(&mut record).await,
        Err(StorageError::WorkerStopped)
    );
    assert_eq!(
        engine.load(&mut record).await,
        Err(StorageError::WorkerStopped)
    );
}
