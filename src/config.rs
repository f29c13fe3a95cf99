//! Configuration for kvwal
//!
//! Centralized configuration with sensible defaults, loadable from a TOML
//! file. Every section and field is optional; missing values fall back to
//! the defaults below.
//!
//! ```toml
//! mode = "tcp"
//!
//! [engine]
//! type = "in-memory"
//!
//! [network]
//! address = "127.0.0.1:3333"
//! max_connections = 100
//! max_message_size = 4096
//! idle_timeout_ms = 300000
//!
//! [logging]
//! level = "info"
//! output = "console"
//!
//! [wal]
//! enabled = true
//! batch_size = 100
//! batch_timeout_ms = 10
//! max_segment_size = 10485760
//! data_directory = "./data/wal"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Log output value meaning "write to the terminal"
pub const CONSOLE_LOG_OUTPUT: &str = "console";

/// Main configuration for a kvwal instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Front end to run
    pub mode: AppMode,

    pub engine: EngineConfig,

    pub network: NetworkConfig,

    pub logging: LoggingConfig,

    pub wal: WalConfig,
}

/// Which front end the server binary runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Read queries from stdin
    #[default]
    Console,

    /// Serve queries over TCP
    Tcp,
}

/// Storage engine selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineType {
    #[default]
    #[serde(rename = "in-memory")]
    InMemory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub kind: EngineType,
}

/// TCP front end configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP listen address
    pub address: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Max length of a single request line (bytes, excluding the newline)
    pub max_message_size: usize,

    /// Close a connection after this long without a request (milliseconds)
    pub idle_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3333".to_string(),
            max_connections: 100,
            max_message_size: 4096,
            idle_timeout_ms: 5 * 60 * 1000,
        }
    }
}

impl NetworkConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,

    /// `"console"` or a file path
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: CONSOLE_LOG_OUTPUT.to_string(),
        }
    }
}

/// Write-ahead log configuration
///
/// Immutable once built; handed by value to [`crate::wal::Wal::open`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    /// When false, pushes succeed immediately and nothing touches disk
    pub enabled: bool,

    /// Commands accumulated before a push requests an early flush
    pub batch_size: usize,

    /// Periodic flush interval (milliseconds)
    pub batch_timeout_ms: u64,

    /// Segment rotation threshold (bytes)
    pub max_segment_size: u64,

    /// Directory holding the numbered segment files
    pub data_directory: PathBuf,

    /// fsync the active segment at the end of every flush
    pub fsync: bool,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: 100,
            batch_timeout_ms: 10,
            max_segment_size: 10 * 1024 * 1024, // 10 MB
            data_directory: PathBuf::from("./data/wal"),
            fsync: true,
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_timeout_ms == 0 {
            return Err(KvError::Config("wal.batch_timeout_ms must be > 0".to_string()));
        }
        if self.max_segment_size == 0 {
            return Err(KvError::Config("wal.max_segment_size must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn max_segment_size(mut self, bytes: u64) -> Self {
        self.config.max_segment_size = bytes;
        self
    }

    pub fn data_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_directory = path.into();
        self
    }

    pub fn fsync(mut self, fsync: bool) -> Self {
        self.config.fsync = fsync;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| KvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| KvError::path_io(path, e))?;
        Self::from_toml(&content).map_err(|e| match e {
            KvError::Config(msg) => {
                KvError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.wal.validate()?;
        if self.network.max_connections == 0 {
            return Err(KvError::Config("network.max_connections must be > 0".to_string()));
        }
        if self.network.max_message_size == 0 {
            return Err(KvError::Config("network.max_message_size must be > 0".to_string()));
        }
        Ok(())
    }
}
