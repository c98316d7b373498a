//! Error types for the coin ledger
//!
//! This module defines every error that can occur while executing ledger
//! operations, building reports, or replaying commands from files.
//!
//! # Error Categories
//!
//! Each variant maps to one [`ErrorKind`]:
//!
//! - **Validation**: non-positive amounts, self-transfers, bad registrations.
//!   Rejected before any store access.
//! - **NotFound**: unknown account, account name or catalog item.
//! - **InsufficientFunds**: the balance check failed.
//! - **Conflict**: lock wait expired, transaction deadline passed, or the
//!   caller cancelled. No partial effect; the caller may retry.
//! - **StoragePersistence**: constraint violations and storage failures.
//! - **Input**: file, CSV and configuration problems of the command-line tool.

use super::account::{AccountId, AccountSide, Coins};
use thiserror::Error;

/// Coarse error classification
///
/// Lets callers choose a response (reject, report missing, retry) without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    Conflict,
    StoragePersistence,
    Input,
}

/// Main error type for the coin ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("Invalid amount {amount}: must be greater than 0")]
    InvalidAmount {
        /// The rejected amount
        amount: Coins,
    },

    /// Transfer source and destination are the same account
    #[error("Account {account} cannot transfer coins to itself")]
    SelfTransfer {
        /// The account on both sides
        account: AccountId,
    },

    /// Account name is empty
    #[error("Invalid account name '{name}'")]
    InvalidAccountName {
        /// The rejected name
        name: String,
    },

    /// Inventory increment of zero
    #[error("Invalid inventory increment {quantity}: must be greater than 0")]
    InvalidQuantity {
        /// The rejected increment
        quantity: u64,
    },

    /// Catalog price is zero or negative
    #[error("Invalid price {price} for item '{item}'")]
    InvalidPrice {
        /// Item type
        item: String,
        /// The rejected price
        price: Coins,
    },

    /// Registration with a name that is already taken
    #[error("Account '{name}' already exists")]
    DuplicateAccount {
        /// The duplicated name
        name: String,
    },

    /// Referenced account does not exist
    ///
    /// `side` tells which side of the operation referenced it.
    #[error("{} {account} not found", side.label())]
    AccountNotFound {
        /// The missing account
        account: AccountId,
        /// Which side of the operation referenced it
        side: AccountSide,
    },

    /// No account carries the given display name
    #[error("Account '{name}' not found")]
    UnknownAccountName {
        /// The unresolved name
        name: String,
    },

    /// Item type is not in the catalog
    #[error("Item '{item}' not found")]
    ItemNotFound {
        /// The unknown item type
        item: String,
    },

    /// Balance is lower than the requested debit
    #[error("Insufficient funds for account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account to debit
        account: AccountId,
        /// Balance at the time of the check
        balance: Coins,
        /// Requested debit
        requested: Coins,
    },

    /// Row lock could not be acquired in time
    ///
    /// Another transaction holds the row. Nothing was written.
    #[error("Conflict on account {account}: lock not acquired within {waited_ms}ms")]
    LockTimeout {
        /// Contended account
        account: AccountId,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Transaction deadline passed before the commit point
    #[error("Transaction timed out after {elapsed_ms}ms")]
    TransactionTimeout {
        /// Time since the transaction started
        elapsed_ms: u64,
    },

    /// Caller cancelled the operation before the commit point
    #[error("Transaction cancelled")]
    Cancelled,

    /// Store call for an account outside the transaction's lock set
    #[error("Account {account} is not locked by this transaction")]
    NotInLockSet {
        /// Account that was not locked
        account: AccountId,
    },

    /// Write would leave a balance below zero
    #[error("Balance of account {account} would become negative: balance {balance}, delta {delta}")]
    BalanceUnderflow {
        /// Account to update
        account: AccountId,
        /// Balance before the write
        balance: Coins,
        /// Rejected delta
        delta: Coins,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account involved
        account: AccountId,
    },

    /// Storage handle was closed
    #[error("Storage is closed")]
    StorageClosed,

    /// Lower-level storage failure
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the failure
        message: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Configuration is unreadable or invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl LedgerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::SelfTransfer { .. }
            | LedgerError::InvalidAccountName { .. }
            | LedgerError::InvalidQuantity { .. }
            | LedgerError::InvalidPrice { .. }
            | LedgerError::DuplicateAccount { .. } => ErrorKind::Validation,
            LedgerError::AccountNotFound { .. }
            | LedgerError::UnknownAccountName { .. }
            | LedgerError::ItemNotFound { .. } => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::LockTimeout { .. }
            | LedgerError::TransactionTimeout { .. }
            | LedgerError::Cancelled => ErrorKind::Conflict,
            LedgerError::NotInLockSet { .. }
            | LedgerError::BalanceUnderflow { .. }
            | LedgerError::ArithmeticOverflow { .. }
            | LedgerError::StorageClosed
            | LedgerError::Storage { .. } => ErrorKind::StoragePersistence,
            LedgerError::FileNotFound { .. }
            | LedgerError::IoError { .. }
            | LedgerError::ParseError { .. }
            | LedgerError::Config { .. } => ErrorKind::Input,
        }
    }

    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Attribute an `AccountNotFound` to a side of the operation
    ///
    /// Other errors pass through unchanged.
    pub fn on_side(self, side: AccountSide) -> Self {
        match self {
            LedgerError::AccountNotFound { account, .. } => {
                LedgerError::AccountNotFound { account, side }
            }
            other => other,
        }
    }
}

// Conversion from io::Error to LedgerError
impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to LedgerError
impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Coins) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create a SelfTransfer error
    pub fn self_transfer(account: AccountId) -> Self {
        LedgerError::SelfTransfer { account }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId, side: AccountSide) -> Self {
        LedgerError::AccountNotFound { account, side }
    }

    /// Create an UnknownAccountName error
    pub fn unknown_account_name(name: &str) -> Self {
        LedgerError::UnknownAccountName {
            name: name.to_string(),
        }
    }

    /// Create an ItemNotFound error
    pub fn item_not_found(item: &str) -> Self {
        LedgerError::ItemNotFound {
            item: item.to_string(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Coins, requested: Coins) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    /// Create a DuplicateAccount error
    pub fn duplicate_account(name: &str) -> Self {
        LedgerError::DuplicateAccount {
            name: name.to_string(),
        }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(account: AccountId, waited_ms: u64) -> Self {
        LedgerError::LockTimeout { account, waited_ms }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage {
            message: message.into(),
        }
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        LedgerError::Config {
            message: message.into(),
        }
    }
}
