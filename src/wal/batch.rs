//! WAL Batch
//!
//! Commands collected since the last flush, plus a one-shot completion
//! signal shared with every pusher waiting on them.
//!
//! ## Lifecycle
//! ```text
//! Open ──(swapped out by flush)──▶ Flushing ──(complete)──▶ Done
//! ```
//! `complete` consumes the batch, so a batch cannot be signalled twice.

use std::sync::{Arc, OnceLock};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;

use crate::cancel::CancelToken;
use crate::error::{KvError, Result};
use crate::protocol::Command;

/// Result of flushing a batch, shared by all of its waiters
pub type FlushOutcome = std::result::Result<(), Arc<KvError>>;

/// Pending commands awaiting a flush
pub struct Batch {
    commands: Vec<Command>,

    /// Dropped on completion; never sends
    done_tx: Sender<()>,
    done_rx: Receiver<()>,

    outcome: Arc<OnceLock<FlushOutcome>>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        let (done_tx, done_rx) = channel::bounded(0);
        Self {
            commands: Vec::with_capacity(capacity),
            done_tx,
            done_rx,
            outcome: Arc::new(OnceLock::new()),
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Handle for waiting on this batch's flush
    pub fn waiter(&self) -> BatchWaiter {
        BatchWaiter {
            done: self.done_rx.clone(),
            outcome: Arc::clone(&self.outcome),
        }
    }

    /// Record the flush result and wake every waiter
    pub fn complete(self, outcome: FlushOutcome) {
        // The batch is consumed here, so the cell is always empty.
        let _ = self.outcome.set(outcome);
        drop(self.done_tx);
    }
}

/// Waits for a specific batch to be flushed
#[derive(Clone)]
pub struct BatchWaiter {
    done: Receiver<()>,
    outcome: Arc<OnceLock<FlushOutcome>>,
}

impl BatchWaiter {
    /// Block until the batch completes or `cancel` fires
    pub fn wait(&self, cancel: &CancelToken) -> Result<()> {
        select! {
            recv(self.done) -> _ => self.outcome(),
            recv(cancel.done()) -> _ => Err(KvError::Cancelled),
        }
    }

    /// Whether the batch has completed
    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    fn outcome(&self) -> Result<()> {
        match self.outcome.get() {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(KvError::Flush(Arc::clone(e))),
            // Sender dropped without completing: the flush thread panicked
            None => Err(KvError::State("batch abandoned before completion")),
        }
    }
}
