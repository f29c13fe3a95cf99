//! Engine Module
//!
//! Coordinates the WAL and the in-memory table, and executes queries.
//!
//! ## Write Path (log-before-apply)
//! 1. Push the command to the WAL and wait until it is flushed
//! 2. The flush that wrote the batch applies it to the MemTable, in log
//!    order, before any pusher of that batch wakes up
//!
//! A failed flush never reaches the MemTable and the error goes back to the
//! client. A cancelled push returns early; its command stays in the batch
//! and is applied once that batch is written. With the WAL disabled,
//! commands are applied directly. Reads never touch the WAL.

use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::{EngineType, WalConfig};
use crate::error::{KvError, Result};
use crate::memtable::{KvStore, MemTable};
use crate::protocol::{self, Command, CommandKind, Query};
use crate::wal::{SegmentSink, SegmentWriter, Wal};

/// The main storage engine
pub struct Engine<T: KvStore = MemTable, S: SegmentSink = SegmentWriter> {
    /// Key-value data, shared with the WAL apply hook
    memtable: Arc<T>,

    /// Write-ahead log (possibly disabled)
    wal: Wal<S>,
}

impl Engine {
    /// Open an engine of the given type with a WAL built from `wal_config`
    pub fn open(kind: EngineType, wal_config: WalConfig) -> Result<Self> {
        let memtable = match kind {
            EngineType::InMemory => MemTable::new(),
        };
        let wal = Wal::open(wal_config)?;
        Ok(Self::new(memtable, wal))
    }
}

impl<T: KvStore + 'static, S: SegmentSink> Engine<T, S> {
    /// Couple `memtable` with `wal`, taking over the WAL's apply hook
    pub fn new(memtable: T, wal: Wal<S>) -> Self {
        let memtable = Arc::new(memtable);
        let target = Arc::clone(&memtable);
        wal.set_apply_hook(Box::new(move |commands: &[Command]| {
            for command in commands {
                apply(target.as_ref(), command);
            }
        }));
        Self { memtable, wal }
    }

    /// Execute a command
    ///
    /// Returns the value for GET and `None` for SET/DEL.
    pub fn execute(&self, cancel: &CancelToken, command: Command) -> Result<Option<String>> {
        if !command.kind().is_mutating() {
            return self.get(command.key()).map(Some);
        }

        if self.wal.is_enabled() {
            self.wal.push(cancel, command)?;
        } else {
            apply(self.memtable.as_ref(), &command);
        }
        Ok(None)
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.memtable.get(key).ok_or(KvError::KeyNotFound)
    }

    /// Log and store a key-value pair
    pub fn set(&self, cancel: &CancelToken, key: &str, value: &str) -> Result<()> {
        self.execute(cancel, Command::set(key, value)).map(|_| ())
    }

    /// Log and remove a key
    pub fn delete(&self, cancel: &CancelToken, key: &str) -> Result<()> {
        self.execute(cancel, Command::del(key)).map(|_| ())
    }

    /// Access the WAL, e.g. to run its flush loop
    pub fn wal(&self) -> &Wal<S> {
        &self.wal
    }

    pub fn memtable(&self) -> &T {
        &self.memtable
    }
}

fn apply<T: KvStore + ?Sized>(memtable: &T, command: &Command) {
    match command.kind() {
        CommandKind::Set => {
            let value = command.value().unwrap_or_default();
            memtable.set(command.key().to_string(), value.to_string());
        }
        CommandKind::Del => memtable.delete(command.key()),
        CommandKind::Get => {}
    }
}

impl<T: KvStore + 'static, S: SegmentSink> Query for Engine<T, S> {
    /// Parse and execute a query line
    ///
    /// GET answers with the value; SET and DEL answer with an empty string.
    fn query(&self, cancel: &CancelToken, query: &str) -> Result<String> {
        let command = protocol::parse(query)?;
        tracing::debug!(command = %command.kind(), "executing query");
        Ok(self.execute(cancel, command)?.unwrap_or_default())
    }
}
