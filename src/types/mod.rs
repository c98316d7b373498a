//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account rows and identifiers
//! - `catalog`: Catalog items and inventory entries
//! - `transaction`: Transaction log records
//! - `command`: Input commands replayed by the command engine
//! - `report`: Account report shapes
//! - `error`: Error types for the coin ledger

pub mod account;
pub mod catalog;
pub mod command;
pub mod error;
pub mod report;
pub mod transaction;

pub use account::{Account, AccountId, AccountSide, Coins};
pub use catalog::{CatalogItem, InventoryEntry, ItemType};
pub use command::LedgerCommand;
pub use error::{ErrorKind, LedgerError};
pub use report::{
    AccountReport, CoinHistory, InventoryItem, NamedReport, ReceivedEntry, SentEntry, SHOP_LABEL,
    UNKNOWN_COUNTERPARTY,
};
pub use transaction::{TransactionId, TransactionKind, TransactionRecord};
