//! TCP Server
//!
//! Accepts connections and hands each one to its own thread.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::NetworkConfig;
use crate::error::{KvError, Result};
use crate::protocol::Query;

use super::connection::{Connection, DELIMITER};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Write deadline for the rejection message
const REJECT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sent to clients over the connection limit
pub const TOO_MANY_CONNECTIONS: &str = "too many connections";

/// TCP server for kvwal
pub struct Server<Q: Query + ?Sized> {
    config: NetworkConfig,
    handler: Arc<Q>,
    listener: TcpListener,
    active: Arc<AtomicUsize>,
}

/// A held connection slot, released on drop
struct Slot {
    active: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<Q: Query + ?Sized + 'static> Server<Q> {
    /// Bind the listener on `config.address`
    pub fn bind(config: NetworkConfig, handler: Arc<Q>) -> Result<Self> {
        let listener = TcpListener::bind(&config.address)
            .map_err(|e| KvError::Network(format!("failed to bind {}: {}", config.address, e)))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            handler,
            listener,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of connections being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Accept connections until `cancel` fires
    pub fn run(&self, cancel: &CancelToken) -> Result<()> {
        tracing::info!("listening on tcp://{}", self.local_addr()?);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.listener.accept() {
                Ok((stream, _)) => self.dispatch(stream, cancel),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    if cancel.wait_timeout(ACCEPT_POLL_INTERVAL) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("error accepting connection: {}", e);
                }
            }
        }

        tracing::info!("tcp listener closed");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, cancel: &CancelToken) {
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::error!("failed to configure connection: {}", e);
            return;
        }

        let Some(slot) = self.acquire_slot() else {
            reject(stream);
            return;
        };

        let handler = Arc::clone(&self.handler);
        let max_message_size = self.config.max_message_size;
        let idle_timeout = self.config.idle_timeout();
        let cancel = cancel.clone();

        let spawned = thread::Builder::new()
            .name("kv-conn".to_string())
            .spawn(move || {
                let _slot = slot;
                let result = Connection::new(stream, handler, max_message_size, idle_timeout)
                    .and_then(|mut conn| conn.handle(&cancel));
                if let Err(e) = result {
                    tracing::warn!("connection ended with error: {}", e);
                }
            });
        if let Err(e) = spawned {
            tracing::error!("failed to spawn connection thread: {}", e);
        }
    }

    fn acquire_slot(&self) -> Option<Slot> {
        let max = self.config.max_connections;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Slot {
                active: Arc::clone(&self.active),
            })
    }
}

/// Tell the client the server is full and close the connection
fn reject(mut stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::warn!("rejecting {}: {}", peer, TOO_MANY_CONNECTIONS);

    if let Err(e) = stream.set_write_timeout(Some(REJECT_WRITE_TIMEOUT)) {
        tracing::error!("failed to set write timeout for {}: {}", peer, e);
        return;
    }
    let mut message = TOO_MANY_CONNECTIONS.as_bytes().to_vec();
    message.push(DELIMITER);
    if let Err(e) = stream.write_all(&message) {
        tracing::error!("failed to notify {}: {}", peer, e);
    }
}
