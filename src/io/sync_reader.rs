//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over ledger commands from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerCommand, LedgerError>` for each CSV row:
//!
//! ```no_run
//! use coin_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => tracing::info!(?command, "read command"),
//!         Err(e) => tracing::warn!(error = %e, "skipping row"),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as `Err(LedgerError::ParseError)`
//!   carrying the line number of the row (the header is line 1)
//!
//! Rows are read one at a time; the file is never loaded into memory.

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{LedgerCommand, LedgerError};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Synchronous CSV reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing target and amount are optional)
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CSV file
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if file opened successfully
    /// * `Err(LedgerError::FileNotFound)` if there is no file at `path`
    /// * `Err(LedgerError::IoError)` if the file could not be opened
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LedgerError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => LedgerError::IoError {
                message: format!("Failed to open file '{}': {}", path.display(), e),
            },
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerCommand, LedgerError>;

    /// Get the next command from the CSV file
    ///
    /// # Returns
    ///
    /// * `Some(Ok(LedgerCommand))` - Successfully parsed command
    /// * `Some(Err(LedgerError::ParseError))` - Malformed row, with its line number
    /// * `None` - End of file reached
    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;

        self.line_num += 1;
        let line = self.line_num + 1;

        Some(match row {
            Ok(csv_record) => convert_csv_record(csv_record).map_err(|e| at_line(e, line)),
            Err(e) => Err(at_line(LedgerError::from(e), line)),
        })
    }
}

fn at_line(error: LedgerError, line: u64) -> LedgerError {
    match error {
        LedgerError::ParseError { message, .. } => LedgerError::ParseError {
            line: Some(line),
            message,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_new_fails_on_missing_file() {
        let result = SyncReader::new(Path::new("nonexistent.csv"));

        assert_eq!(
            result.unwrap_err(),
            LedgerError::FileNotFound {
                path: "nonexistent.csv".to_string()
            }
        );
    }

    #[test]
    fn test_sync_reader_iterates_all_command_types() {
        let csv_content = "type,account,target,amount\n\
            register,alice,,\n\
            register,bob,,500\n\
            transfer,alice,bob,40\n\
            purchase,bob,cup,\n";
        let file = create_temp_csv(csv_content);

        let reader = SyncReader::new(file.path()).unwrap();
        let commands: Vec<_> = reader.collect::<Result<_, _>>().unwrap();

        assert_eq!(
            commands,
            vec![
                LedgerCommand::Register {
                    name: "alice".to_string(),
                    balance: None
                },
                LedgerCommand::Register {
                    name: "bob".to_string(),
                    balance: Some(500)
                },
                LedgerCommand::Transfer {
                    from: "alice".to_string(),
                    to: "bob".to_string(),
                    amount: 40
                },
                LedgerCommand::Purchase {
                    account: "bob".to_string(),
                    item: "cup".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_sync_reader_accepts_short_rows() {
        let csv_content = "type,account,target,amount\nregister,alice\npurchase,alice,pen\n";
        let file = create_temp_csv(csv_content);

        let reader = SyncReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.collect();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(Result::is_ok));
    }

    #[test]
    fn test_sync_reader_includes_line_numbers_in_errors() {
        let csv_content = "type,account,target,amount\n\
            register,alice,,\n\
            transfer,alice,bob,lots\n\
            register,bob,,\n";
        let file = create_temp_csv(csv_content);

        let reader = SyncReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.collect();

        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(records[2].is_ok());

        let error = records[1].as_ref().unwrap_err();
        assert!(matches!(error, LedgerError::ParseError { line: Some(3), .. }));
        assert!(error.to_string().contains("Invalid amount"));
    }

    #[test]
    fn test_sync_reader_handles_whitespace_and_case() {
        let csv_content = "type,account,target,amount\n  TRANSFER  ,  alice  ,  bob  ,  7  \n";
        let file = create_temp_csv(csv_content);

        let reader = SyncReader::new(file.path()).unwrap();
        let records: Vec<_> = reader.filter_map(Result::ok).collect();

        assert_eq!(
            records,
            vec![LedgerCommand::Transfer {
                from: "alice".to_string(),
                to: "bob".to_string(),
                amount: 7
            }]
        );
    }

    #[test]
    fn test_sync_reader_handles_empty_file_after_header() {
        let file = create_temp_csv("type,account,target,amount\n");

        let reader = SyncReader::new(file.path()).unwrap();

        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn test_sync_reader_continues_after_error() {
        let csv_content = "type,account,target,amount\n\
            register,alice,,\n\
            refund,alice,,5\n\
            register,bob,,\n";
        let file = create_temp_csv(csv_content);

        let reader = SyncReader::new(file.path()).unwrap();
        let valid: Vec<_> = reader.filter_map(Result::ok).collect();

        assert_eq!(valid.len(), 2);
    }
}
