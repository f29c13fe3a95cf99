//! Query parser
//!
//! Grammar:
//!
//! ```text
//! query       = set_command | get_command | del_command
//! set_command = "SET" argument argument
//! get_command = "GET" argument
//! del_command = "DEL" argument
//! argument    = char { char }
//! char        = letter | digit | "*" | "_" | "/"
//! ```

use crate::error::{KvError, Result};

use super::{Command, CommandKind};

/// Parse a query line into a validated command
///
/// Tokens are separated by single spaces; empty tokens (from repeated
/// spaces) are dropped.
pub fn parse(line: &str) -> Result<Command> {
    tracing::trace!("parsing {:?}", line);

    let mut tokens = Vec::new();
    for token in line.split(' ') {
        if let Some((index, ch)) = token.char_indices().find(|&(_, c)| !is_valid_char(c)) {
            return Err(KvError::InvalidCommand(format!(
                "invalid char {}[{}]",
                ch, index
            )));
        }
        if !token.is_empty() {
            tokens.push(token);
        }
    }

    let Some((&keyword, args)) = tokens.split_first() else {
        return Err(KvError::InvalidCommand("invalid command len 0".to_string()));
    };

    let kind = CommandKind::from_keyword(keyword).ok_or_else(|| {
        KvError::InvalidCommand(format!("invalid command type {}", keyword))
    })?;

    Command::new(kind, args.iter().map(|s| s.to_string()).collect())
}

fn is_valid_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '*' | '_' | '/')
}
