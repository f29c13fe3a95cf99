//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/set/delete operations
//! - Query parsing and execution
//! - Log-before-apply: WAL records and WAL failures
//! - Concurrent writers through the WAL

use std::sync::Arc;
use std::thread;

use kvwal::config::{EngineType, WalConfig};
use kvwal::memtable::MemTable;
use kvwal::wal::{codec, list_segments, segment_path, SegmentSink, Wal};
use kvwal::{CancelToken, Command, Engine, KvError, Query};
use parking_lot::Mutex;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn memory_engine() -> Engine {
    Engine::open(EngineType::InMemory, WalConfig::default()).unwrap()
}

/// Engine whose WAL flushes on every push
fn logged_engine(temp: &TempDir) -> Engine {
    let config = WalConfig::builder()
        .enabled(true)
        .batch_size(0)
        .data_directory(temp.path())
        .build();
    Engine::open(EngineType::InMemory, config).unwrap()
}

/// Sink that keeps every logged command in memory
#[derive(Clone, Default)]
struct MemoryLog {
    records: Arc<Mutex<Vec<Command>>>,
}

impl SegmentSink for MemoryLog {
    fn write(&mut self, commands: &[Command]) -> kvwal::Result<()> {
        self.records.lock().extend_from_slice(commands);
        Ok(())
    }
}

fn wait_for_pending<S: SegmentSink>(engine: &Engine<MemTable, S>, n: usize) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while engine.wal().pending() < n {
        assert!(std::time::Instant::now() < deadline, "pushes never arrived");
        thread::yield_now();
    }
}

struct BrokenDisk;

impl SegmentSink for BrokenDisk {
    fn write(&mut self, _commands: &[Command]) -> kvwal::Result<()> {
        Err(KvError::State("disk is read-only"))
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_set_get() {
    let engine = memory_engine();
    let cancel = CancelToken::new();

    engine.set(&cancel, "hello", "world").unwrap();

    assert_eq!(engine.get("hello").unwrap(), "world");
}

#[test]
fn test_engine_get_nonexistent_key() {
    let engine = memory_engine();
    assert!(matches!(engine.get("nonexistent"), Err(KvError::KeyNotFound)));
}

#[test]
fn test_engine_delete() {
    let engine = memory_engine();
    let cancel = CancelToken::new();

    engine.set(&cancel, "key", "value").unwrap();
    engine.delete(&cancel, "key").unwrap();

    assert!(matches!(engine.get("key"), Err(KvError::KeyNotFound)));
}

#[test]
fn test_engine_execute_returns_value_only_for_get() {
    let engine = memory_engine();
    let cancel = CancelToken::new();

    assert_eq!(engine.execute(&cancel, Command::set("k", "v")).unwrap(), None);
    assert_eq!(
        engine.execute(&cancel, Command::get("k")).unwrap(),
        Some("v".to_string())
    );
    assert_eq!(engine.execute(&cancel, Command::del("k")).unwrap(), None);
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_query_round_trip() {
    let engine = memory_engine();
    let cancel = CancelToken::new();

    assert_eq!(engine.query(&cancel, "SET user_1 alice").unwrap(), "");
    assert_eq!(engine.query(&cancel, "GET user_1").unwrap(), "alice");
    assert_eq!(engine.query(&cancel, "DEL user_1").unwrap(), "");
    assert_eq!(
        engine.query(&cancel, "GET user_1").unwrap_err().to_string(),
        "key not found"
    );
}

#[test]
fn test_query_rejects_invalid_input() {
    let engine = memory_engine();
    let cancel = CancelToken::new();

    assert!(matches!(
        engine.query(&cancel, "SET a"),
        Err(KvError::InvalidCommand(_))
    ));
    assert!(matches!(
        engine.query(&cancel, "UPSERT a 1"),
        Err(KvError::InvalidCommand(_))
    ));
    assert!(engine.memtable().is_empty());
}

// =============================================================================
// WAL Integration Tests
// =============================================================================

#[test]
fn test_disabled_wal_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = WalConfig::builder()
        .enabled(false)
        .data_directory(temp.path().join("wal"))
        .build();
    let engine = Engine::open(EngineType::InMemory, config).unwrap();

    engine.set(&CancelToken::new(), "a", "1").unwrap();

    assert!(!engine.wal().is_enabled());
    assert!(!temp.path().join("wal").exists());
}

#[test]
fn test_mutations_are_logged_reads_are_not() {
    let temp = TempDir::new().unwrap();
    let engine = logged_engine(&temp);
    let cancel = CancelToken::new();

    engine.query(&cancel, "SET a 1").unwrap();
    engine.query(&cancel, "GET a").unwrap();
    engine.query(&cancel, "DEL a").unwrap();
    let _ = engine.query(&cancel, "GET a");

    let logged = codec::read_segment(&segment_path(temp.path(), 1)).unwrap();
    assert_eq!(logged, vec![Command::set("a", "1"), Command::del("a")]);
}

#[test]
fn test_wal_failure_fails_write_and_skips_apply() {
    let config = WalConfig::builder().enabled(true).batch_size(0).build();
    let engine = Engine::new(MemTable::new(), Wal::with_sink(config, BrokenDisk));
    let cancel = CancelToken::new();

    let err = engine.set(&cancel, "a", "1").unwrap_err();

    assert!(matches!(err, KvError::Flush(_)));
    assert!(err.to_string().contains("disk is read-only"));
    assert!(matches!(engine.get("a"), Err(KvError::KeyNotFound)));
}

#[test]
fn test_cancelled_write_is_not_applied() {
    let temp = TempDir::new().unwrap();
    let config = WalConfig::builder()
        .enabled(true)
        .batch_size(100)
        .data_directory(temp.path())
        .build();
    let engine = Engine::open(EngineType::InMemory, config).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        engine.set(&cancel, "a", "1"),
        Err(KvError::Cancelled)
    ));
    assert!(matches!(engine.get("a"), Err(KvError::KeyNotFound)));
    assert_eq!(engine.wal().pending(), 1);
}

#[test]
fn test_cancelled_write_is_applied_once_logged() {
    let log = MemoryLog::default();
    let config = WalConfig::builder().enabled(true).batch_size(100).build();
    let engine = Engine::new(MemTable::new(), Wal::with_sink(config, log.clone()));

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
        engine.set(&cancel, "a", "1"),
        Err(KvError::Cancelled)
    ));

    engine.wal().flush().unwrap();

    assert_eq!(*log.records.lock(), vec![Command::set("a", "1")]);
    assert_eq!(engine.get("a").unwrap(), "1");
}

#[test]
fn test_same_key_writes_apply_in_log_order() {
    for _ in 0..100 {
        let log = MemoryLog::default();
        let config = WalConfig::builder().enabled(true).batch_size(100).build();
        let engine = Arc::new(Engine::new(
            MemTable::new(),
            Wal::with_sink(config, log.clone()),
        ));

        // Both writes land in one batch, so their pushers wake together
        let writers: Vec<_> = ["1", "2"]
            .into_iter()
            .map(|value| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || engine.set(&CancelToken::new(), "k", value))
            })
            .collect();
        wait_for_pending(&engine, 2);
        engine.wal().flush().unwrap();
        for writer in writers {
            writer.join().unwrap().unwrap();
        }

        let last_logged = log.records.lock().last().cloned().unwrap();
        assert_eq!(
            engine.get("k").unwrap(),
            last_logged.value().unwrap(),
            "memtable diverged from the log"
        );
    }
}

#[test]
fn test_concurrent_writers_all_logged() {
    let temp = TempDir::new().unwrap();
    let config = WalConfig::builder()
        .enabled(true)
        .batch_size(4)
        .batch_timeout(std::time::Duration::from_millis(5))
        .data_directory(temp.path())
        .fsync(false)
        .build();
    let engine = Arc::new(Engine::open(EngineType::InMemory, config).unwrap());

    let ticker_cancel = CancelToken::new();
    let ticker = {
        let wal = engine.wal().clone();
        let cancel = ticker_cancel.clone();
        thread::spawn(move || wal.run(&cancel))
    };

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let cancel = CancelToken::new();
                for i in 0..20 {
                    engine
                        .set(&cancel, &format!("t{}_{}", t, i), &i.to_string())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    ticker_cancel.cancel();
    ticker.join().unwrap();

    assert_eq!(engine.memtable().len(), 80);

    let mut logged = Vec::new();
    for id in list_segments(temp.path()).unwrap() {
        logged.extend(codec::read_segment(&segment_path(temp.path(), id)).unwrap());
    }
    assert_eq!(logged.len(), 80);
}
