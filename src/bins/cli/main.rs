//! `chainstore-cli`, the thin operator binary over the engine.
//!
//! Commands mirror the fixed external interface: `current-increment`,
//! `compact`, `get`, `del`, `set`, `serialize`, `ingest`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use chainstore::{ChainIndex, OpenOptions};

#[derive(Parser, Debug)]
#[command(name = "chainstore-cli", about = "Operate on a chainstore transaction log")]
struct Cli {
    /// Database file to operate on.
    #[arg(short = 'f', long = "file", global = true)]
    file: PathBuf,

    /// Verbosity level.
    #[arg(short = 'v', long = "verbosity", value_enum, default_value_t = Verbosity::Warn, global = true)]
    verbosity: Verbosity,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Verbosity {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn tracing_level(self) -> tracing::Level {
        match self {
            Verbosity::Fatal | Verbosity::Error => tracing::Level::ERROR,
            Verbosity::Warn => tracing::Level::WARN,
            Verbosity::Info => tracing::Level::INFO,
            Verbosity::Debug => tracing::Level::DEBUG,
            Verbosity::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current head generation.
    CurrentIncrement,
    /// Reclaim transactions whose records are all superseded.
    Compact,
    /// Print the value for a key, or "(not found)".
    Get { key: String },
    /// Tombstone a key.
    Del { key: String },
    /// Write a value for a key.
    Set { key: String, value: String },
    /// Hex-encode a transaction (head, or a given generation).
    Serialize { generation: Option<u64> },
    /// Ingest a hex-encoded transaction from a peer.
    Ingest { hex: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level())
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut store = ChainIndex::open(&cli.file, OpenOptions::default())?;

    match cli.command {
        Command::CurrentIncrement => {
            println!("{}", store.head_generation());
        }

        Command::Compact => {
            store.compact()?;
        }

        Command::Get { key } => match store.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => {
                println!("(not found)");
                return Ok(ExitCode::FAILURE);
            }
        },

        Command::Del { key } => {
            store.del(key.as_bytes())?;
        }

        Command::Set { key, value } => {
            store.set(key.as_bytes(), value.as_bytes())?;
        }

        Command::Serialize { generation } => {
            let generation = generation.unwrap_or_else(|| store.head_generation());
            let cursor = store.fetch(generation)?.ok_or_else(|| {
                anyhow::anyhow!("no transaction at or after generation {generation}")
            })?;
            let bytes = store.serialize(&cursor)?;
            println!("{}", hex::encode(bytes));
        }

        Command::Ingest { hex } => {
            let bytes = hex::decode(hex.trim())?;
            store.ingest(&bytes)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
