//! # kvwal
//!
//! A minimal key-value store with:
//! - A line-oriented text protocol (`GET`, `SET`, `DEL`)
//! - Console and TCP front ends
//! - An in-memory engine
//! - An optional batching, segmented write-ahead log (WAL)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │       Console        │   │      TCP Server      │
//! └──────────┬───────────┘   └──────────┬───────────┘
//!            └─────────────┬────────────┘
//!                          ▼
//!            ┌──────────────────────────┐
//!            │   Engine (parse + exec)  │
//!            └─────────────┬────────────┘
//!              SET/DEL     │      GET
//!          ┌───────────────┴──────────┐
//!          ▼                          ▼
//!   ┌─────────────┐  then      ┌─────────────┐
//!   │     WAL     │ ─────────▶ │  MemTable   │
//!   │  (batched)  │   apply    │  (RwLock)   │
//!   └──────┬──────┘            └─────────────┘
//!          ▼
//!   segments 1, 2, 3, ...
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;

pub mod console;
pub mod engine;
pub mod memtable;
pub mod network;
pub mod protocol;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use cancel::CancelToken;
pub use config::{Config, WalConfig};
pub use engine::Engine;
pub use error::{KvError, Result};
pub use protocol::{Command, CommandKind, Query};
pub use wal::Wal;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvwal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
