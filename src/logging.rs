//! Logging setup
//!
//! Installs the global tracing subscriber for the binaries.

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LoggingConfig, CONSOLE_LOG_OUTPUT};
use crate::error::{KvError, Result};

/// Initialize tracing from the logging config
///
/// `RUST_LOG` overrides `config.level`. A non-console output is a file path,
/// truncated on startup.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| KvError::Config(format!("invalid log level {:?}: {}", config.level, e)))?;

    let builder = fmt().with_env_filter(filter).with_target(true).with_thread_ids(true);

    let installed = if config.output == CONSOLE_LOG_OUTPUT {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        let file = File::create(&config.output).map_err(|e| KvError::path_io(&config.output, e))?;
        builder
            .with_ansi(false)
            .with_writer(Arc::new(file))
            .try_init()
    };

    installed.map_err(|e| KvError::Config(format!("failed to install logger: {}", e)))
}
