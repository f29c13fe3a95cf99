//! TCP Client
//!
//! Sends query lines to a server and reads one response line per query.

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::error::{KvError, Result};
use crate::protocol::Query;

use super::connection::DELIMITER;

struct Stream {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Client for a kvwal server
pub struct TcpClient {
    stream: Mutex<Stream>,
    address: String,
}

impl TcpClient {
    /// Connect to `address`; `read_timeout` bounds the wait for each response
    pub fn connect(address: &str, read_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .map_err(|e| KvError::Network(format!("failed to connect to {}: {}", address, e)))?;
        stream.set_nodelay(true)?;
        if !read_timeout.is_zero() {
            stream.set_read_timeout(Some(read_timeout))?;
        }

        tracing::debug!("connected to {}", address);

        let read_stream = stream.try_clone()?;
        Ok(Self {
            stream: Mutex::new(Stream {
                reader: BufReader::new(read_stream),
                writer: BufWriter::new(stream),
            }),
            address: address.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one query and return the raw response line (without newline)
    pub fn send(&self, query: &str) -> Result<String> {
        let mut stream = self.stream.lock();

        stream.writer.write_all(query.as_bytes())?;
        stream.writer.write_all(&[DELIMITER])?;
        stream.writer.flush()?;
        tracing::debug!("sent query: {}", query);

        let mut response = String::new();
        let read = stream.reader.read_line(&mut response).map_err(|e| {
            if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                KvError::Network(format!("timed out waiting for {}", self.address))
            } else {
                KvError::Io(e)
            }
        })?;
        if read == 0 {
            return Err(KvError::Network(format!(
                "connection closed by {}",
                self.address
            )));
        }

        let response = response.trim_end_matches(['\r', '\n']).to_string();
        tracing::debug!("received response: {}", response);
        Ok(response)
    }
}

impl Query for TcpClient {
    fn query(&self, cancel: &CancelToken, query: &str) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(KvError::Cancelled);
        }
        self.send(query)
    }
}
