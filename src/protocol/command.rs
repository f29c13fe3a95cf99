//! Command definitions
//!
//! Represents commands from clients and the records stored in the WAL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Get,
    Set,
    Del,
}

impl CommandKind {
    /// Keyword as it appears in a query line
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Get => "GET",
            CommandKind::Set => "SET",
            CommandKind::Del => "DEL",
        }
    }

    /// Match a query keyword (case-sensitive)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "GET" => Some(CommandKind::Get),
            "SET" => Some(CommandKind::Set),
            "DEL" => Some(CommandKind::Del),
            _ => None,
        }
    }

    /// Number of arguments the command takes
    pub fn arity(&self) -> usize {
        match self {
            CommandKind::Get | CommandKind::Del => 1,
            CommandKind::Set => 2,
        }
    }

    /// Whether the command changes stored data (and so goes through the WAL)
    pub fn is_mutating(&self) -> bool {
        !matches!(self, CommandKind::Get)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated command
///
/// Fields are private so the arity invariant holds for every value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    kind: CommandKind,
    args: Vec<String>,
}

impl Command {
    /// Build a command, checking the argument count
    pub fn new(kind: CommandKind, args: Vec<String>) -> Result<Self> {
        let command = Self { kind, args };
        command.validate()?;
        Ok(command)
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Get,
            args: vec![key.into()],
        }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Set,
            args: vec![key.into(), value.into()],
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Del,
            args: vec![key.into()],
        }
    }

    /// Check the arity invariant
    ///
    /// Needed after deserialization, which bypasses [`Command::new`].
    pub fn validate(&self) -> Result<()> {
        let expected = self.kind.arity();
        if self.args.len() != expected {
            return Err(KvError::InvalidCommand(format!(
                "args count must be {}",
                expected
            )));
        }
        Ok(())
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// First argument (every command has one)
    pub fn key(&self) -> &str {
        &self.args[0]
    }

    /// Second argument of a SET
    pub fn value(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
