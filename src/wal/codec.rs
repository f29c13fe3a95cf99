//! WAL record codec
//!
//! Each record is one bincode-encoded [`Command`]. Records are
//! self-delimiting (variant tag plus length-prefixed strings), so a segment
//! is a plain concatenation with no framing of its own.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::error::{KvError, Result};
use crate::protocol::Command;

/// Append one encoded record to `buf`
pub fn encode_into(buf: &mut BytesMut, command: &Command) -> Result<()> {
    bincode::serialize_into(buf.writer(), command).map_err(KvError::Encode)
}

/// Encode a single record
pub fn encode(command: &Command) -> Result<Vec<u8>> {
    bincode::serialize(command).map_err(KvError::Encode)
}

/// Size of a record without encoding it
pub fn encoded_len(command: &Command) -> Result<u64> {
    bincode::serialized_size(command).map_err(KvError::Encode)
}

/// Decode every record in a segment's bytes, in order
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Command>> {
    let mut cursor = Cursor::new(bytes);
    let mut commands = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let command: Command =
            bincode::deserialize_from(&mut cursor).map_err(KvError::Decode)?;
        command.validate()?;
        commands.push(command);
    }

    Ok(commands)
}

/// Read and decode a whole segment file
pub fn read_segment(path: &Path) -> Result<Vec<Command>> {
    let bytes = fs::read(path).map_err(|e| KvError::path_io(path, e))?;
    decode_all(&bytes)
}
