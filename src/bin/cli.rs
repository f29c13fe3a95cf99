//! kvwal CLI Client
//!
//! Command-line interface for interacting with a kvwal server.

use std::io;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kvwal::config::LoggingConfig;
use kvwal::console::Console;
use kvwal::network::TcpClient;
use kvwal::{CancelToken, Command};

/// kvwal CLI
#[derive(Parser, Debug)]
#[command(name = "kvwal-cli")]
#[command(about = "CLI for the kvwal key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:3333")]
    server: String,

    /// Response timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    /// Log file (client logs never go to the terminal)
    #[arg(long, default_value = "./client-output.log")]
    log_file: String,

    /// Run one command; without it, start an interactive console
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },
}

impl Commands {
    fn into_command(self) -> Command {
        match self {
            Commands::Get { key } => Command::get(key),
            Commands::Set { key, value } => Command::set(key, value),
            Commands::Del { key } => Command::del(key),
        }
    }
}

fn main() {
    let args = Args::parse();

    let logging = LoggingConfig {
        level: "debug".to_string(),
        output: args.log_file.clone(),
    };
    if let Err(e) = kvwal::logging::init(&logging) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let client = match TcpClient::connect(&args.server, Duration::from_millis(args.timeout_ms)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    tracing::info!("kvwal-cli connected to {}", client.address());

    let result = match args.command {
        Some(command) => client
            .send(&command.into_command().to_string())
            .map(|response| println!("{}", response)),
        None => {
            let stdin = io::stdin();
            Console::new(&client, stdin.lock(), io::stdout()).run(&CancelToken::new())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}
