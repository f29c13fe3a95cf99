//! Interactive console
//!
//! Reads one query per line and prints each result. Works with any
//! [`Query`] handler: the local engine or a remote [`crate::network::TcpClient`].

use std::io::{BufRead, Write};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::protocol::Query;

/// Line that ends the session
pub const EXIT_COMMAND: &str = "exit";

pub struct Console<'a, Q: Query + ?Sized, R, W> {
    handler: &'a Q,
    input: R,
    output: W,
}

impl<'a, Q: Query + ?Sized, R: BufRead, W: Write> Console<'a, Q, R, W> {
    pub fn new(handler: &'a Q, input: R, output: W) -> Self {
        Self {
            handler,
            input,
            output,
        }
    }

    /// Run until `exit`, end of input, or cancellation
    ///
    /// Query errors are printed and the loop continues.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        tracing::info!("console mode started");
        writeln!(
            self.output,
            "Enter queries (GET/SET/DEL) or '{}' to quit",
            EXIT_COMMAND
        )?;

        let mut line = String::new();
        loop {
            if cancel.is_cancelled() {
                break;
            }

            write!(self.output, "> ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }

            let query = line.trim_end_matches(['\r', '\n']);
            tracing::debug!("input: {}", query);
            if query == EXIT_COMMAND {
                break;
            }

            match self.handler.query(cancel, query) {
                Ok(response) => writeln!(self.output, "result: {}", response)?,
                Err(e) => {
                    tracing::warn!(error = %e, "query failed");
                    writeln!(self.output, "error: {}", e)?;
                }
            }
        }

        writeln!(self.output, "bye")?;
        tracing::info!("console mode stopped");
        Ok(())
    }

    /// Give back the output sink (handy for inspecting a buffer)
    pub fn into_output(self) -> W {
        self.output
    }
}
