//! Protocol Module
//!
//! Defines the line-oriented text protocol shared by the console and TCP
//! front ends.
//!
//! ### Requests
//! One query per line, e.g. `SET user_1 alice`:
//! - `GET key`
//! - `SET key value`
//! - `DEL key`
//!
//! ### Responses (TCP)
//! One line per request: the value for GET, `ok` for SET/DEL, or the error
//! text.

mod command;
mod parser;

pub use command::{Command, CommandKind};
pub use parser::parse;

use crate::cancel::CancelToken;
use crate::error::Result;

/// Anything that can answer a query line
///
/// Implemented by the local [`crate::Engine`] and by the remote
/// [`crate::network::TcpClient`], so front ends can drive either.
pub trait Query: Send + Sync {
    fn query(&self, cancel: &CancelToken, query: &str) -> Result<String>;
}
