use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay coin ledger commands and print the resulting state
#[derive(Parser, Debug)]
#[command(name = "coin-ledger")]
#[command(about = "Replay coin transfers and merch purchases from a CSV file", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Catalog CSV with `item,price` columns
    #[arg(
        long = "catalog",
        value_name = "FILE",
        help = "Catalog CSV file (default: built-in merch catalog)"
    )]
    pub catalog: Option<PathBuf>,

    /// Ledger configuration file
    #[arg(long = "config", value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// What to print once every command has been processed
    #[arg(
        long = "output",
        value_name = "FORMAT",
        default_value = "balances",
        help = "Output: 'balances' (CSV) or 'reports' (JSON lines)"
    )]
    pub output: OutputFormat,

    /// Emit logs as JSON
    #[arg(long = "log-json", help = "Write logs to stderr as JSON lines")]
    pub log_json: bool,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// Available output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `account,name,balance` CSV sorted by account id
    Balances,
    /// One account report per line
    Reports,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced by
    /// the defaults with a logged warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }
}
