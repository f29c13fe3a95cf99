//! MemTable implementation
//!
//! HashMap-based memtable with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::KvStore;

/// In-memory table
#[derive(Default)]
pub struct MemTable {
    data: RwLock<HashMap<String, String>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for MemTable {
    fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    fn set(&self, key: String, value: String) {
        self.data.write().insert(key, value);
    }

    fn delete(&self, key: &str) {
        self.data.write().remove(key);
    }
}
