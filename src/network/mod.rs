//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling for shutdown
//! - One thread per connection, capped by `max_connections`
//! - Queries routed through any [`crate::protocol::Query`] handler

mod client;
mod connection;
mod server;

pub use client::TcpClient;
pub use connection::{Connection, DELIMITER, OK_RESPONSE};
pub use server::{Server, TOO_MANY_CONNECTIONS};
