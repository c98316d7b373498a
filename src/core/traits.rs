//! Store, catalog and directory seams used by the ledger core
//!
//! The store traits are implemented by the transactional scope
//! ([`LedgerTxn`](crate::core::txn::LedgerTxn)), so every read and write made
//! through them belongs to exactly one atomic ledger operation. The read
//! halves are also implemented by
//! [`AccountView`](crate::core::storage::AccountView) for report reads. The catalog and
//! the account directory are external collaborators the core only reads from.

use crate::types::{
    AccountId, Coins, InventoryEntry, LedgerError, TransactionId, TransactionKind,
    TransactionRecord,
};
use std::collections::HashMap;

/// Per-account balances
pub trait AccountStore {
    /// Current balance, including writes staged in this scope
    fn balance(&self, account: AccountId) -> Result<Coins, LedgerError>;

    /// Add `delta` to the balance and return the resulting balance
    ///
    /// This is the only balance mutation primitive. A write that would leave
    /// the balance negative or overflow is rejected.
    fn apply_delta(&mut self, account: AccountId, delta: Coins) -> Result<Coins, LedgerError>;
}

/// Read side of the per-(account, item type) owned quantities
pub trait InventoryReader {
    /// Owned quantity of `item`, `None` if the account never bought it
    fn entry(&self, account: AccountId, item: &str) -> Result<Option<InventoryEntry>, LedgerError>;

    /// Every item the account owns, sorted by item type
    fn entries(&self, account: AccountId) -> Result<Vec<InventoryEntry>, LedgerError>;
}

/// Per-(account, item type) owned quantities
pub trait InventoryStore: InventoryReader {
    /// Create the entry at `by` if absent, otherwise increase it by `by`
    fn upsert_increment(
        &mut self,
        account: AccountId,
        item: &str,
        by: u64,
    ) -> Result<InventoryEntry, LedgerError>;
}

/// Read side of the transaction log
pub trait HistoryReader {
    /// Records where `account` is the sender or the receiver, in id order
    fn list_for_account(&self, account: AccountId) -> Result<Vec<TransactionRecord>, LedgerError>;
}

/// Append-only log of completed ledger events
pub trait TransactionLog: HistoryReader {
    /// Append a record and return its assigned id
    fn append(&mut self, kind: TransactionKind, amount: Coins)
        -> Result<TransactionId, LedgerError>;
}

/// Read-only item price lookup
pub trait Catalog: Send + Sync {
    /// Price of `item`, or `ItemNotFound`
    fn price(&self, item: &str) -> Result<Coins, LedgerError>;
}

/// Account identity resolution
pub trait AccountDirectory: Send + Sync {
    /// Resolve a display name to an account id
    fn find_by_name(&self, name: &str) -> Result<Option<AccountId>, LedgerError>;

    /// Resolve many account ids to display names in one call
    ///
    /// Ids without an account are left out of the returned map.
    fn display_names(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, String>, LedgerError>;
}
