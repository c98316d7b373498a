//! Asynchronous batch processing strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. Commands are read in batches and each batch is
//! handed to the BatchProcessor, which runs independent groups of commands
//! concurrently.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (account-name partitioning + tokio tasks)
//!         └── LedgerEngine
//!             └── AsyncLedger (ledger operations on the blocking pool)
//! ```
//!
//! Batches run one after another, so a command never overtakes one from an
//! earlier batch. Output is identical to the sync strategy for the same input.

use crate::core::r#async::BatchProcessor;
use crate::core::LedgerEngine;
use crate::io::async_reader::AsyncReader;
use crate::strategy::{ProcessingStrategy, ProcessingSummary};
use crate::types::LedgerError;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for batch processing
///
/// Controls how commands are batched and the number of worker threads.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of runtime worker threads driving command groups
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy with the specified configuration
    ///
    /// # Arguments
    ///
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay commands batch by batch on a dedicated multi-threaded runtime
    ///
    /// This method:
    /// 1. Creates a tokio multi-threaded runtime
    /// 2. Reads commands in batches from CSV using AsyncReader
    /// 3. Processes each batch with the BatchProcessor and waits for it
    /// 4. Logs rejected commands and counts the outcome
    ///
    /// Fatal errors (file not found, I/O errors, runtime errors) are returned
    /// immediately.
    fn process(
        &self,
        input_path: &Path,
        engine: &Arc<LedgerEngine>,
    ) -> Result<ProcessingSummary, LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let processor = BatchProcessor::new(Arc::clone(engine));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => LedgerError::FileNotFound {
                        path: input_path.display().to_string(),
                    },
                    _ => LedgerError::IoError {
                        message: format!("Failed to open file '{}': {}", input_path.display(), e),
                    },
                })?;

            // csv-async reads futures::io, tokio files implement tokio::io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut summary = ProcessingSummary::default();
            let mut batches = 0usize;
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                batches += 1;
                debug!(batch = batches, commands = batch.len(), "processing batch");

                for outcome in processor.process_batch(batch).await {
                    if let Err(e) = &outcome.result {
                        warn!(
                            batch = batches,
                            index = outcome.index,
                            command = outcome.command.name(),
                            error = %e,
                            "command rejected"
                        );
                    }
                    summary.record(&outcome.result);
                }
            }
            summary.skipped = reader.skipped();

            info!(
                batches,
                applied = summary.applied,
                rejected = summary.rejected,
                skipped = summary.skipped,
                "input processed"
            );
            Ok(summary)
        })
    }
}
