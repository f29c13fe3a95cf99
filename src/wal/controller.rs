//! WAL Controller
//!
//! Batches concurrent pushes and makes each pusher wait until its command is
//! on disk.
//!
//! ## Concurrency Model
//!
//! - **Push**: appends to the current batch under `current`, then waits on
//!   that batch's completion signal outside the lock. Crossing `batch_size`
//!   spawns a detached flush request.
//! - **Flush**: runs under the [`FlushGate`] with a fixed key, so at most one
//!   executes at a time. It swaps the current batch for a fresh one under the
//!   lock, writes the old one with the lock released, hands a written batch
//!   to the apply hook, then completes it.
//! - **Run**: requests a flush every `batch_timeout` until cancelled. No
//!   final flush happens on cancellation.
//!
//! The sink is only written inside a gated flush, so its mutex never sees
//! two writers at once.

use std::mem;
use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use crossbeam::select;
use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::config::WalConfig;
use crate::error::{KvError, Result};
use crate::protocol::Command;

use super::batch::{Batch, FlushOutcome};
use super::gate::FlushGate;
use super::segment::{SegmentSink, SegmentWriter};

/// Dedup key shared by every flush request
const FLUSH_KEY: &str = "new batch";

/// Upper bound on the commands preallocated for a fresh batch
const MAX_BATCH_PREALLOC: usize = 1024;

/// Called with each durable batch, in log order, before its pushers wake
pub type ApplyHook = Box<dyn Fn(&[Command]) + Send + Sync>;

/// Batching write-ahead log
///
/// Cheap to clone; clones share the same batch and segment writer. A
/// disabled WAL holds no state and every push succeeds immediately.
pub struct Wal<S: SegmentSink = SegmentWriter> {
    shared: Option<Arc<Shared<S>>>,
}

impl<S: SegmentSink> Clone for Wal<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

struct Shared<S> {
    config: WalConfig,

    /// Batch currently accepting pushes
    current: Mutex<Batch>,

    sink: Mutex<S>,

    apply: Mutex<Option<ApplyHook>>,

    gate: FlushGate,
}

impl Wal<SegmentWriter> {
    /// Open the WAL described by `config`
    ///
    /// A disabled config opens nothing on disk.
    pub fn open(config: WalConfig) -> Result<Self> {
        if !config.enabled {
            tracing::info!("WAL disabled");
            return Ok(Self::disabled());
        }

        config.validate()?;
        let writer = SegmentWriter::open(
            &config.data_directory,
            config.max_segment_size,
            config.fsync,
        )?;

        tracing::info!(
            dir = %config.data_directory.display(),
            segment = writer.active_segment_id(),
            batch_size = config.batch_size,
            batch_timeout_ms = config.batch_timeout_ms,
            "WAL opened"
        );

        Ok(Self::with_sink(config, writer))
    }
}

impl<S: SegmentSink> Wal<S> {
    /// A WAL that accepts every push without persisting anything
    pub fn disabled() -> Self {
        Self { shared: None }
    }

    /// Build an enabled WAL on top of an arbitrary sink
    pub fn with_sink(config: WalConfig, sink: S) -> Self {
        let current = Batch::with_capacity(batch_capacity(&config));
        Self {
            shared: Some(Arc::new(Shared {
                config,
                current: Mutex::new(current),
                sink: Mutex::new(sink),
                apply: Mutex::new(None),
                gate: FlushGate::new(),
            })),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Install the hook that applies durable batches
    ///
    /// Flushes are serialized, so the hook sees commands in exactly the
    /// order they were logged. Replaces any previous hook. Failed batches
    /// never reach it. No-op on a disabled WAL.
    pub fn set_apply_hook(&self, hook: ApplyHook) {
        if let Some(shared) = &self.shared {
            *shared.apply.lock() = Some(hook);
        }
    }

    /// Append `command` and block until it has been flushed
    ///
    /// Returns the flush error if the batch failed to persist, or
    /// `Cancelled` if `cancel` fired first. A cancelled command stays in its
    /// batch and is still written by a later flush.
    pub fn push(&self, cancel: &CancelToken, command: Command) -> Result<()> {
        let Some(shared) = &self.shared else {
            return Ok(());
        };

        let (waiter, len) = {
            let mut batch = shared.current.lock();
            batch.push(command);
            (batch.waiter(), batch.len())
        };

        if len > shared.config.batch_size {
            Shared::request_flush(shared);
        }

        waiter.wait(cancel)
    }

    /// Flush the current batch now
    ///
    /// Joins an in-flight flush instead if one is running.
    pub fn flush(&self) -> Result<()> {
        match &self.shared {
            Some(shared) => shared.flush().map_err(KvError::Flush),
            None => Ok(()),
        }
    }

    /// Flush every `batch_timeout` until `cancel` fires
    ///
    /// Flush errors are logged and the loop keeps going. Whatever is in the
    /// current batch at cancellation is left unflushed.
    pub fn run(&self, cancel: &CancelToken) {
        let Some(shared) = &self.shared else {
            let _ = cancel.done().recv();
            return;
        };

        let ticker = channel::tick(shared.config.batch_timeout());
        tracing::debug!("WAL flush loop started");

        loop {
            select! {
                recv(cancel.done()) -> _ => {
                    tracing::info!("WAL flush loop stopped");
                    return;
                }
                recv(ticker) -> _ => {
                    if let Err(e) = shared.flush() {
                        tracing::error!(error = %e, "periodic WAL flush failed");
                    }
                }
            }
        }
    }

    /// Commands waiting in the current batch
    pub fn pending(&self) -> usize {
        self.shared
            .as_ref()
            .map(|shared| shared.current.lock().len())
            .unwrap_or(0)
    }

    /// Run `f` against the sink, e.g. to inspect segment state
    ///
    /// Holds the sink lock, so a flush started meanwhile waits for `f`.
    /// Returns `None` for a disabled WAL.
    pub fn with_sink_ref<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.shared.as_ref().map(|shared| f(&shared.sink.lock()))
    }
}

impl<S: SegmentSink> Shared<S> {
    /// Fire-and-forget flush on a detached thread
    fn request_flush(shared: &Arc<Self>) {
        let shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("wal-flush".to_string())
            .spawn(move || {
                if let Err(e) = shared.flush() {
                    tracing::warn!(error = %e, "WAL flush failed");
                }
            });
        if let Err(e) = spawned {
            // The ticker still picks the batch up.
            tracing::error!(error = %e, "failed to spawn WAL flush thread");
        }
    }

    fn flush(&self) -> FlushOutcome {
        self.gate.run(FLUSH_KEY, || self.flush_current())
    }

    /// Swap out the current batch, write it and complete it
    fn flush_current(&self) -> FlushOutcome {
        let batch = {
            let mut current = self.current.lock();
            mem::replace(&mut *current, Batch::with_capacity(batch_capacity(&self.config)))
        };

        let outcome = if batch.is_empty() {
            Ok(())
        } else {
            tracing::debug!(commands = batch.len(), "flushing WAL batch");
            self.sink.lock().write(batch.commands()).map_err(Arc::new)
        };

        if outcome.is_ok() && !batch.is_empty() {
            if let Some(apply) = &*self.apply.lock() {
                apply(batch.commands());
            }
        }

        batch.complete(outcome.clone());
        outcome
    }
}

fn batch_capacity(config: &WalConfig) -> usize {
    config.batch_size.saturating_add(1).min(MAX_BATCH_PREALLOC)
}
