//! Flush gate
//!
//! Coalesces concurrent calls that share a key: while one call for a key is
//! running, later callers wait for it and get its outcome instead of
//! starting their own.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::KvError;

use super::batch::FlushOutcome;

/// An execution in progress
struct Call {
    done: Receiver<()>,
    outcome: OnceLock<FlushOutcome>,
}

impl Call {
    fn wait(&self) -> FlushOutcome {
        let _ = self.done.recv();
        match self.outcome.get() {
            Some(outcome) => outcome.clone(),
            None => Err(Arc::new(KvError::State("flush abandoned before completion"))),
        }
    }
}

/// Deduplicates flushes by key
#[derive(Default)]
pub struct FlushGate {
    calls: Mutex<HashMap<&'static str, Arc<Call>>>,
}

/// Removes the call from the map even if the leader unwinds, then releases
/// waiters by dropping the sender.
struct Leader<'a> {
    gate: &'a FlushGate,
    key: &'static str,
    _done: Sender<()>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        self.gate.calls.lock().remove(self.key);
    }
}

impl FlushGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` unless a call for `key` is already in flight, in which case
    /// wait for that one and return its outcome
    pub fn run<F>(&self, key: &'static str, f: F) -> FlushOutcome
    where
        F: FnOnce() -> FlushOutcome,
    {
        let (leader, call) = {
            let mut calls = self.calls.lock();
            if let Some(call) = calls.get(key) {
                let call = Arc::clone(call);
                drop(calls);
                return call.wait();
            }

            let (tx, rx) = channel::bounded(0);
            let call = Arc::new(Call {
                done: rx,
                outcome: OnceLock::new(),
            });
            calls.insert(key, Arc::clone(&call));
            (
                Leader {
                    gate: self,
                    key,
                    _done: tx,
                },
                call,
            )
        };

        let outcome = f();
        let _ = call.outcome.set(outcome.clone());
        drop(leader);
        outcome
    }

    /// Whether a call for `key` is running
    pub fn in_flight(&self, key: &'static str) -> bool {
        self.calls.lock().contains_key(key)
    }
}
