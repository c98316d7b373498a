//! Asynchronous CSV reader with batch interface
//!
//! Provides a streaming, batch-oriented interface over ledger commands from
//! a CSV source.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCommands
//!                  ↓
//!           csv_format module
//!           (CsvRecord, convert_csv_record)
//! ```

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::LedgerCommand;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Malformed rows are logged and skipped; `skipped()` counts them.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
    skipped: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
            skipped: 0,
        }
    }

    /// Read a batch of commands
    ///
    /// Reads rows until `batch_size` commands were converted or the input
    /// ends. Invalid rows are logged with their line number and skipped.
    ///
    /// # Arguments
    ///
    /// * `batch_size` - Maximum number of commands to return
    ///
    /// # Returns
    ///
    /// The commands in file order. An empty vector means the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(row) = records.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match row {
                Ok(csv_record) => match convert_csv_record(csv_record) {
                    Ok(command) => batch.push(command),
                    Err(e) => {
                        self.skipped += 1;
                        warn!(line, error = %e, "skipping invalid command");
                    }
                },
                Err(e) => {
                    self.skipped += 1;
                    warn!(line, error = %e, "skipping malformed row");
                }
            }
        }

        batch
    }

    /// Number of rows skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
