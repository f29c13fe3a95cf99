//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for mutating commands through batched, append-only
//! logging.
//!
//! ## Responsibilities
//! - Collect concurrent pushes into batches
//! - Flush a batch when it grows past `batch_size` or on a timer
//! - Run at most one flush at a time
//! - Block each pusher until its batch is on disk
//! - Rotate size-bounded segment files
//!
//! ## File Format
//! ```text
//! {data_directory}/1, 2, 3, ...   (no extension, no leading zeros)
//!
//! ┌──────────────┬──────────────┬─────┐
//! │ Record 1     │ Record 2     │ ... │   bincode-encoded Command,
//! └──────────────┴──────────────┴─────┘   no header, index or checksum
//! ```
//!
//! Segments are never replayed, compacted or deleted by this module.

pub mod codec;
mod batch;
mod controller;
mod gate;
mod segment;

pub use batch::{Batch, BatchWaiter, FlushOutcome};
pub use controller::{ApplyHook, Wal};
pub use gate::FlushGate;
pub use segment::{list_segments, segment_path, SegmentSink, SegmentWriter};
