//! kvwal Server Binary
//!
//! Runs the key-value store in console or TCP mode.

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use kvwal::config::AppMode;
use kvwal::console::Console;
use kvwal::network::Server;
use kvwal::{CancelToken, Config, Engine};

/// kvwal Server
#[derive(Parser, Debug)]
#[command(name = "kvwal-server")]
#[command(about = "Key-value store with a batching write-ahead log")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, default_value = "kv-storage-config.toml")]
    config: PathBuf,

    /// Front end: console or tcp
    #[arg(long, value_parser = parse_mode)]
    mode: Option<AppMode>,

    /// Listen address (host:port)
    #[arg(short, long)]
    address: Option<String>,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Maximum request size in bytes
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Close idle connections after this many milliseconds
    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// Enable the write-ahead log
    #[arg(long)]
    wal: bool,

    /// WAL segment directory
    #[arg(long)]
    wal_dir: Option<PathBuf>,
}

fn parse_mode(s: &str) -> Result<AppMode, String> {
    match s {
        "console" => Ok(AppMode::Console),
        "tcp" => Ok(AppMode::Tcp),
        other => Err(format!("invalid app mode {:?}", other)),
    }
}

fn load_config(args: &Args) -> kvwal::Result<Config> {
    let mut config = if args.config.exists() {
        Config::from_file(&args.config)?
    } else {
        eprintln!(
            "warning: {} not found, using default config",
            args.config.display()
        );
        Config::default()
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(address) = &args.address {
        config.network.address = address.clone();
    }
    if let Some(max) = args.max_connections {
        config.network.max_connections = max;
    }
    if let Some(max) = args.max_message_size {
        config.network.max_message_size = max;
    }
    if let Some(ms) = args.idle_timeout_ms {
        config.network.idle_timeout_ms = ms;
    }
    if args.wal {
        config.wal.enabled = true;
    }
    if let Some(dir) = &args.wal_dir {
        config.wal.data_directory = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = kvwal::logging::init(&config.logging) {
        eprintln!("{}", e);
        process::exit(1);
    }

    tracing::info!("kvwal server v{}", kvwal::VERSION);

    let engine = match Engine::open(config.engine.kind, config.wal.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("failed to open engine: {}", e);
            process::exit(1);
        }
    };

    let cancel = CancelToken::new();

    let wal = engine.wal().clone();
    let wal_cancel = cancel.clone();
    let wal_loop = thread::Builder::new()
        .name("wal-ticker".to_string())
        .spawn(move || wal.run(&wal_cancel));
    let wal_loop = match wal_loop {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("failed to start WAL flush loop: {}", e);
            process::exit(1);
        }
    };

    let result = match config.mode {
        AppMode::Console => {
            let stdin = io::stdin();
            let mut console = Console::new(engine.as_ref(), stdin.lock(), io::stdout());
            console.run(&cancel)
        }
        AppMode::Tcp => {
            Server::bind(config.network.clone(), Arc::clone(&engine)).and_then(|s| s.run(&cancel))
        }
    };

    cancel.cancel();
    let _ = wal_loop.join();

    if let Err(e) = result {
        tracing::error!("server error: {}", e);
        process::exit(1);
    }

    tracing::info!("server stopped");
}
