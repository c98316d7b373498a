//! Core business logic module
//!
//! This module contains the ledger components:
//! - `traits` - Store, catalog and directory seams
//! - `storage` - Storage handle with row-level locking
//! - `txn` - Transactional scope and cancellation control
//! - `catalog` - Static merchandise catalog
//! - `ledger` - Transfers and purchases
//! - `report` - Account report builder
//! - `engine` - Command engine replaying input commands
//! - `async` - Async facade and concurrent batch processing

pub mod r#async;
pub mod catalog;
pub mod engine;
pub mod ledger;
pub mod report;
pub mod storage;
pub mod traits;
pub mod txn;

pub use catalog::StaticCatalog;
pub use engine::{CommandOutcome, LedgerEngine};
pub use ledger::Ledger;
pub use r#async::{AsyncLedger, BatchProcessor, ProcessingResult};
pub use report::ReportBuilder;
pub use storage::{AccountView, Storage, StorageConfig};
pub use traits::{
    AccountDirectory, AccountStore, Catalog, HistoryReader, InventoryReader, InventoryStore,
    TransactionLog,
};
pub use txn::{LedgerTxn, TxnControl};
