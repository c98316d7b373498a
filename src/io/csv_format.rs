//! CSV format handling for ledger commands and output
//!
//! This module centralizes all file format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Balance CSV and report JSON-lines serialization
//!
//! All functions are pure (no file access) for easy testing.

use crate::types::{Account, Coins, LedgerCommand, LedgerError, NamedReport};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: type, account, target, amount.
/// `target` is the recipient name for transfers and the item type for
/// purchases; `amount` is the optional starting balance for registrations.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub command_type: String,
    pub account: String,
    pub target: Option<String>,
    pub amount: Option<String>,
}

/// Convert a CsvRecord to a LedgerCommand
///
/// This function:
/// - Parses the command type (case-insensitive)
/// - Requires a target for transfers and purchases
/// - Parses the amount as a whole number of coins
///
/// Amount sign is not checked here; the ledger rejects non-positive amounts.
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// * `Ok(LedgerCommand)` - Successfully converted record
/// * `Err(LedgerError::ParseError)` - The record is malformed
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<LedgerCommand, LedgerError> {
    let account = csv_record.account.trim().to_string();
    if account.is_empty() {
        return Err(parse_error(format!(
            "Missing account for '{}' command",
            csv_record.command_type
        )));
    }

    let target = non_empty(csv_record.target);
    let amount = match non_empty(csv_record.amount) {
        Some(amount) => Some(amount.parse::<Coins>().map_err(|_| {
            parse_error(format!("Invalid amount '{}' for account '{}'", amount, account))
        })?),
        None => None,
    };

    match csv_record.command_type.trim().to_lowercase().as_str() {
        "register" => Ok(LedgerCommand::Register {
            name: account,
            balance: amount,
        }),
        "transfer" => {
            let to = target.ok_or_else(|| {
                parse_error(format!("Transfer from '{}' requires a target", account))
            })?;
            let amount = amount.ok_or_else(|| {
                parse_error(format!("Transfer from '{}' requires an amount", account))
            })?;
            Ok(LedgerCommand::Transfer {
                from: account,
                to,
                amount,
            })
        }
        "purchase" => {
            let item = target.ok_or_else(|| {
                parse_error(format!("Purchase by '{}' requires an item", account))
            })?;
            Ok(LedgerCommand::Purchase { account, item })
        }
        other => Err(parse_error(format!(
            "Invalid command type: '{}' for account '{}'",
            other, account
        ))),
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_error(message: String) -> LedgerError {
    LedgerError::ParseError {
        line: None,
        message,
    }
}

/// Write account balances to CSV format
///
/// Writes accounts in CSV format with columns: account, name, balance.
/// Accounts are sorted by id for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of accounts to write
/// * `output` - Mutable reference to a writer for outputting CSV
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "name", "balance"])?;

    let mut sorted_accounts: Vec<&Account> = accounts.iter().collect();
    sorted_accounts.sort_by_key(|account| account.id);

    for account in sorted_accounts {
        writer.write_record(&[
            account.id.to_string(),
            account.name.clone(),
            account.balance.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write account reports as JSON lines, one report per line
pub fn write_reports_jsonl(
    reports: &[NamedReport],
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    for report in reports {
        let line = serde_json::to_string(report)
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to serialize report for '{}': {}", report.user, e),
            })?;
        writeln!(output, "{}", line)?;
    }

    output.flush()?;
    Ok(())
}
