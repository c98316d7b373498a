//! Processing strategy module for command replay
//!
//! This module defines the Strategy pattern for complete processing pipelines,
//! encompassing both CSV parsing and command processing. This allows different
//! processing implementations (synchronous, asynchronous batch) to be selected at runtime.

use crate::cli::{OutputFormat, StrategyType};
use crate::core::LedgerEngine;
use crate::io::csv_format::{write_accounts_csv, write_reports_jsonl};
use crate::types::LedgerError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Counts of what happened to the rows of one input file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// Commands that took effect
    pub applied: usize,
    /// Commands the ledger rejected
    pub rejected: usize,
    /// Rows that could not be parsed into a command
    pub skipped: usize,
}

impl ProcessingSummary {
    fn record<T>(&mut self, result: &Result<T, LedgerError>) {
        match result {
            Ok(_) => self.applied += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Processing strategy trait for complete command replay pipelines
///
/// Each strategy reads commands from a CSV file and applies them to a shared
/// [`LedgerEngine`] in file order.
pub trait ProcessingStrategy: Send + Sync {
    /// Replay every command of `input_path` against `engine`
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input CSV file containing commands
    /// * `engine` - Engine the commands are applied to
    ///
    /// # Returns
    ///
    /// * `Ok(ProcessingSummary)` once the whole file was processed
    /// * `Err(LedgerError)` if a fatal error occurred (file not found, I/O error, etc.)
    ///
    /// Malformed rows and rejected commands are logged and counted, and do not
    /// stop processing.
    fn process(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine>,
    ) -> Result<ProcessingSummary, LedgerError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
///
/// # Returns
///
/// A boxed trait object implementing the ProcessingStrategy trait
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}

/// Write the final ledger state in the requested format
pub fn write_output(
    engine: &LedgerEngine,
    format: OutputFormat,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    match format {
        OutputFormat::Balances => write_accounts_csv(&engine.balances()?, output),
        OutputFormat::Reports => write_reports_jsonl(&engine.reports()?, output),
    }
}
