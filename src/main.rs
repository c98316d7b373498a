//! Coin Ledger CLI
//!
//! Replays coin ledger commands from a CSV file and prints the final state.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > balances.csv
//! cargo run -- --strategy sync commands.csv > balances.csv
//! cargo run -- --output reports commands.csv > reports.jsonl
//! cargo run -- --catalog catalog.csv --config ledger.toml commands.csv
//! RUST_LOG=coin_ledger=debug cargo run -- --log-json commands.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, invalid configuration, etc.)

use coin_ledger::cli::{self, CliArgs, StrategyType};
use coin_ledger::config::LedgerConfig;
use coin_ledger::core::{Catalog, LedgerEngine, StaticCatalog};
use coin_ledger::io::read_catalog;
use coin_ledger::strategy;
use coin_ledger::types::LedgerError;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::parse_args();
    init_tracing(args.log_json);

    if let Err(e) = run(&args) {
        error!(error = %e, "processing failed");
        process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: &CliArgs) -> Result<(), LedgerError> {
    let config = match &args.config {
        Some(path) => LedgerConfig::from_file(path)?.with_overrides(|key| std::env::var(key).ok())?,
        None => LedgerConfig::from_env()?,
    };

    let catalog: Arc<dyn Catalog> = match &args.catalog {
        Some(path) => Arc::new(read_catalog(path)?),
        None => Arc::new(StaticCatalog::merch()),
    };

    info!(?config, "starting ledger");
    let engine = Arc::new(LedgerEngine::new(config, catalog));

    let strategy = {
        let config = if matches!(args.strategy, StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, config)
    };

    strategy.process(&args.input_file, &engine)?;

    let mut output = std::io::stdout().lock();
    let written = strategy::write_output(&engine, args.output, &mut output);
    engine.shutdown();
    written
}
