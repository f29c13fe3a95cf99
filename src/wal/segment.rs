//! Segment Writer
//!
//! Appends encoded commands to numbered segment files and rotates to the
//! next number once the active segment would exceed its size limit.
//!
//! ## Directory Layout
//! ```text
//! {data_directory}/
//!   ├── 1      (full)
//!   ├── 2      (full)
//!   └── 3      (active)
//! ```
//!
//! There is no manifest: the active segment is re-derived from the directory
//! listing on every open.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{KvError, Result};
use crate::protocol::Command;

use super::codec;

/// Initial capacity of the reusable encode buffer
const COMMAND_BUFFER_SIZE: usize = 1024;

/// Destination for flushed batches
///
/// Implemented by [`SegmentWriter`]; the controller is generic over it so
/// the write path can be instrumented.
pub trait SegmentSink: Send + 'static {
    /// Durably append `commands` in order
    fn write(&mut self, commands: &[Command]) -> Result<()>;
}

/// The segment currently receiving writes
struct ActiveSegment {
    id: u64,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Writes commands into size-bounded segment files
///
/// Not internally synchronized: only one flush at a time may call
/// [`SegmentWriter::write`].
pub struct SegmentWriter {
    dir: PathBuf,
    max_segment_size: u64,

    /// Bytes in the active segment, including buffered ones
    size: u64,

    segment: Option<ActiveSegment>,

    /// Reused for every record
    buffer: BytesMut,

    fsync: bool,
}

impl SegmentWriter {
    /// Open the writer on `dir`, creating it if needed
    ///
    /// Picks the highest-numbered segment as the active one, or the next
    /// number if that segment is already full.
    pub fn open(dir: impl Into<PathBuf>, max_segment_size: u64, fsync: bool) -> Result<Self> {
        let mut writer = Self {
            dir: dir.into(),
            max_segment_size,
            size: 0,
            segment: None,
            buffer: BytesMut::with_capacity(COMMAND_BUFFER_SIZE),
            fsync,
        };
        writer.open_segment()?;
        Ok(writer)
    }

    /// Discover and open the active segment
    ///
    /// Fails with a `State` error if a segment is already open.
    pub fn open_segment(&mut self) -> Result<()> {
        if self.segment.is_some() {
            return Err(KvError::State("segment already open"));
        }

        fs::create_dir_all(&self.dir).map_err(|e| KvError::path_io(&self.dir, e))?;

        let (id, size) = discover_active_segment(&self.dir, self.max_segment_size)?;
        let path = segment_path(&self.dir, id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| KvError::path_io(&path, e))?;

        tracing::debug!(segment = id, size, "opened WAL segment {}", path.display());

        self.segment = Some(ActiveSegment {
            id,
            path,
            writer: BufWriter::new(file),
        });
        self.size = size;

        Ok(())
    }

    /// Flush and close the active segment (no-op if none is open)
    pub fn close_segment(&mut self) -> Result<()> {
        if let Some(mut segment) = self.segment.take() {
            self.finish(&mut segment)?;
        }
        self.size = 0;
        Ok(())
    }

    /// Number of the active segment
    pub fn active_segment_id(&self) -> Option<u64> {
        self.segment.as_ref().map(|s| s.id)
    }

    /// Path of the active segment
    pub fn active_segment_path(&self) -> Option<&Path> {
        self.segment.as_ref().map(|s| s.path.as_path())
    }

    /// Bytes written to the active segment so far
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append commands, rotating segments as needed
    ///
    /// The buffered writer is flushed once at the end, not per record.
    pub fn write(&mut self, commands: &[Command]) -> Result<()> {
        let mut segment = self
            .segment
            .take()
            .ok_or(KvError::State("no segment open"))?;

        let result = self.write_records(&mut segment, commands);
        let result = result.and_then(|_| self.finish(&mut segment));

        self.segment = Some(segment);
        result
    }

    fn write_records(&mut self, segment: &mut ActiveSegment, commands: &[Command]) -> Result<()> {
        for command in commands {
            self.buffer.clear();
            codec::encode_into(&mut self.buffer, command)?;
            let len = self.buffer.len() as u64;

            // An oversized record still goes into an empty segment on its own
            if self.size > 0 && self.size + len > self.max_segment_size {
                self.rotate(segment)?;
            }

            segment
                .writer
                .write_all(&self.buffer)
                .map_err(|e| KvError::path_io(&segment.path, e))?;
            self.size += len;
        }
        Ok(())
    }

    /// Switch to the next numbered segment
    ///
    /// The next segment must be brand new: finding data in it means another
    /// writer touched the directory.
    fn rotate(&mut self, segment: &mut ActiveSegment) -> Result<()> {
        self.finish(segment)?;

        let next_id = segment.id + 1;
        let next_path = segment_path(&self.dir, next_id);
        let next_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&next_path)
            .map_err(|e| KvError::path_io(&next_path, e))?;
        let existing = next_file
            .metadata()
            .map_err(|e| KvError::path_io(&next_path, e))?
            .len();
        if existing != 0 {
            return Err(KvError::State("next segment isn't empty"));
        }

        tracing::info!(
            from = segment.id,
            to = next_id,
            size = self.size,
            "rotating WAL segment"
        );

        // Dropping the old writer closes its file; it was flushed above.
        *segment = ActiveSegment {
            id: next_id,
            path: next_path,
            writer: BufWriter::new(next_file),
        };
        self.size = 0;

        Ok(())
    }

    /// Push buffered bytes to the OS, and to disk when fsync is on
    fn finish(&self, segment: &mut ActiveSegment) -> Result<()> {
        segment
            .writer
            .flush()
            .map_err(|e| KvError::path_io(&segment.path, e))?;
        if self.fsync {
            segment
                .writer
                .get_ref()
                .sync_data()
                .map_err(|e| KvError::path_io(&segment.path, e))?;
        }
        Ok(())
    }
}

impl SegmentSink for SegmentWriter {
    fn write(&mut self, commands: &[Command]) -> Result<()> {
        SegmentWriter::write(self, commands)
    }
}

/// Path of segment `id` inside `dir`
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(id.to_string())
}

/// Parse a canonical segment name: ASCII digits, no leading zeros
fn parse_segment_name(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    name.parse().ok()
}

/// List segment numbers in `dir`, ascending
///
/// Directories and non-numeric names are ignored.
pub fn list_segments(dir: &Path) -> Result<Vec<u64>> {
    let entries = fs::read_dir(dir).map_err(|e| KvError::path_io(dir, e))?;

    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| KvError::path_io(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| KvError::path_io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(parse_segment_name) {
            ids.push(id);
        }
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Pick the segment to append to and its current size
///
/// - empty directory: segment 1
/// - highest segment below the limit: that segment
/// - highest segment at or over the limit: the next number, empty
fn discover_active_segment(dir: &Path, max_segment_size: u64) -> Result<(u64, u64)> {
    let Some(&last) = list_segments(dir)?.last() else {
        return Ok((1, 0));
    };

    let path = segment_path(dir, last);
    let size = fs::metadata(&path)
        .map_err(|e| KvError::path_io(&path, e))?
        .len();

    if size < max_segment_size {
        Ok((last, size))
    } else {
        Ok((last + 1, 0))
    }
}
