//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. It coordinates the SyncReader (for CSV input)
//! and the LedgerEngine (for ledger operations), one row at a time.
//!
//! Memory usage stays constant in the size of the input file: rows are
//! streamed through the iterator and never buffered.

use crate::core::LedgerEngine;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingStrategy, ProcessingSummary};
use crate::types::LedgerError;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use coin_ledger::config::LedgerConfig;
/// use coin_ledger::core::{LedgerEngine, StaticCatalog};
/// use coin_ledger::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let engine = Arc::new(LedgerEngine::new(
///     LedgerConfig::default(),
///     Arc::new(StaticCatalog::merch()),
/// ));
///
/// SyncProcessingStrategy
///     .process(Path::new("commands.csv"), &engine)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Replay commands one at a time on the calling thread
    ///
    /// Fatal errors (file not found, I/O errors) are returned immediately.
    /// Row errors and rejected commands are logged and processing continues.
    fn process(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine>,
    ) -> Result<ProcessingSummary, LedgerError> {
        let reader = SyncReader::new(input_path)?;
        let mut summary = ProcessingSummary::default();

        for result in reader {
            match result {
                Ok(command) => {
                    let name = command.name();
                    let outcome = engine.process(command);
                    if let Err(e) = &outcome {
                        warn!(command = name, error = %e, "command rejected");
                    }
                    summary.record(&outcome);
                }
                Err(e) => {
                    summary.skipped += 1;
                    warn!(error = %e, "skipping row");
                }
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            skipped = summary.skipped,
            "input processed"
        );
        Ok(summary)
    }
}
