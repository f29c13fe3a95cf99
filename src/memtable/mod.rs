//! MemTable Module
//!
//! In-memory key-value storage.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Concurrent readers, exclusive writers
//!
//! ## Data Structure Choice
//! A HashMap wrapped in a parking_lot RwLock. Nothing iterates keys in
//! order, so there is no need for a BTreeMap.

mod table;

pub use table::MemTable;

/// Storage engine operations used by [`crate::Engine`]
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: String, value: String);

    fn delete(&self, key: &str);
}
