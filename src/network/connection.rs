//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{KvError, Result};
use crate::protocol::Query;

/// Request/response line delimiter
pub const DELIMITER: u8 = b'\n';

/// Response for a successful command with no value
pub const OK_RESPONSE: &str = "ok";

/// Handles a single client connection
pub struct Connection<Q: Query + ?Sized> {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Query handler shared with the other connections
    handler: Arc<Q>,

    max_message_size: usize,

    /// Peer address for logging
    peer_addr: String,
}

/// Outcome of reading one request line
enum Message {
    Line(String),
    TooLarge,
    Closed,
}

impl<Q: Query + ?Sized> Connection<Q> {
    /// Create a new connection handler
    ///
    /// The idle timeout becomes the socket read timeout.
    pub fn new(
        stream: TcpStream,
        handler: Arc<Q>,
        max_message_size: usize,
        idle_timeout: Duration,
    ) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;
        if !idle_timeout.is_zero() {
            stream.set_read_timeout(Some(idle_timeout))?;
        }

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            handler,
            max_message_size,
            peer_addr,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns when the client disconnects, goes idle, sends an oversized
    /// message, or `cancel` fires between requests.
    pub fn handle(&mut self, cancel: &CancelToken) -> Result<()> {
        tracing::info!("{} connected", self.peer_addr);

        let result = self.serve(cancel);

        tracing::info!("{} disconnected", self.peer_addr);
        result
    }

    fn serve(&mut self, cancel: &CancelToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let message = match self.read_message() {
                Ok(Message::Line(line)) => line,
                Ok(Message::Closed) => return Ok(()),
                Ok(Message::TooLarge) => {
                    tracing::warn!(
                        "message from {} exceeds {} bytes",
                        self.peer_addr,
                        self.max_message_size
                    );
                    let _ = self.send(&format!(
                        "message too large (max {} bytes)",
                        self.max_message_size
                    ));
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    tracing::debug!("closing idle connection {}", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("connection reset by {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("error reading from {}: {}", self.peer_addr, e);
                    let _ = self.send(&e.to_string());
                    return Err(e);
                }
            };

            let message = message.trim();
            tracing::debug!("received message from {}: {}", self.peer_addr, message);

            let response = match self.handler.query(cancel, message) {
                Ok(value) if value.is_empty() => OK_RESPONSE.to_string(),
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(error = %e, "error executing query {}", message);
                    e.to_string()
                }
            };

            if let Err(e) = self.send(&response) {
                if let KvError::Io(ref io_err) = e {
                    if matches!(
                        io_err.kind(),
                        ErrorKind::ConnectionAborted
                            | ErrorKind::ConnectionReset
                            | ErrorKind::BrokenPipe
                    ) {
                        tracing::debug!(
                            "client {} disconnected before response could be sent",
                            self.peer_addr
                        );
                        return Ok(());
                    }
                }
                tracing::warn!("error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Read one request line, bounded by `max_message_size`
    fn read_message(&mut self) -> Result<Message> {
        let mut buf = Vec::new();
        let limit = self.max_message_size as u64 + 1;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(DELIMITER, &mut buf)?;

        if read == 0 {
            return Ok(Message::Closed);
        }
        if buf.last() == Some(&DELIMITER) {
            buf.pop();
        } else if buf.len() > self.max_message_size {
            return Ok(Message::TooLarge);
        }

        String::from_utf8(buf)
            .map(Message::Line)
            .map_err(|_| KvError::Protocol("message is not valid UTF-8".to_string()))
    }

    fn send(&mut self, response: &str) -> Result<()> {
        self.writer.write_all(response.as_bytes())?;
        self.writer.write_all(&[DELIMITER])?;
        self.writer.flush()?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
