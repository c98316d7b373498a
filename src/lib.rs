//! Coin Ledger Library
//! # Overview
//!
//! This library provides a transactional coin ledger: accounts hold integer
//! coin balances, move coins to each other and spend them on merchandise.
//! Every operation either takes full effect or none.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, TransactionRecord, AccountReport, etc.)
//! - [`config`] - Ledger configuration from TOML and environment
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::storage`] - Storage handle with per-account row locks
//!   - [`core::txn`] - Transactional scope, cancellation and deadlines
//!   - [`core::ledger`] - Transfers and purchases
//!   - [`core::report`] - Account reports (balance, inventory, coin history)
//!   - [`core::engine`] - Command replay used by the CLI
//! - [`io`] - CSV readers and output writers
//! - [`strategy`] - Sync and async processing strategies
//!
//! # Operations
//!
//! - **Transfer**: Move coins between two distinct accounts
//! - **Purchase**: Buy one unit of a catalog item at its catalog price
//! - **Report**: Read an account's balance, inventory and coin history
//!
//! # Guarantees
//!
//! - Balances never become negative
//! - A transfer conserves the total number of coins
//! - Failed operations leave no trace in balances, inventory or history
//! - Concurrent operations on overlapping accounts never deadlock

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::LedgerConfig;
pub use core::{Ledger, LedgerEngine, ReportBuilder, StaticCatalog, Storage, StorageConfig};
pub use io::{write_accounts_csv, write_reports_jsonl};
pub use types::{
    Account, AccountId, AccountReport, Coins, ErrorKind, LedgerCommand, LedgerError,
    TransactionId, TransactionKind, TransactionRecord,
};
