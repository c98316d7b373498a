//! Transactional scope for ledger operations
//!
//! A [`LedgerTxn`] is opened by [`Storage::transaction`](crate::core::Storage::transaction)
//! after every row in the lock set is exclusively locked. Writes made through the
//! store traits are staged inside the scope and become visible only when the
//! scope commits. Dropping the scope without committing discards them.
//!
//! [`TxnControl`] carries the caller's cancellation token and deadline. It is
//! checked while waiting for row locks and once more right before the commit
//! point; after that point the operation always completes.

use crate::core::storage::Storage;
use crate::core::traits::{
    AccountStore, HistoryReader, InventoryReader, InventoryStore, TransactionLog,
};
use crate::types::{
    Account, AccountId, AccountSide, Coins, InventoryEntry, ItemType, LedgerError, TransactionId,
    TransactionKind, TransactionRecord,
};
use chrono::Utc;
use parking_lot::RwLockWriteGuard;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline for one ledger operation
#[derive(Debug, Clone)]
pub struct TxnControl {
    token: Option<CancellationToken>,
    started: Instant,
    deadline: Option<Instant>,
}

impl TxnControl {
    /// Control with no cancellation token and no deadline
    pub fn new() -> Self {
        TxnControl {
            token: None,
            started: Instant::now(),
            deadline: None,
        }
    }

    /// Abort the operation once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Abort the operation if it has not reached the commit point within `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.started + timeout);
        self
    }

    /// Fail if the operation was cancelled or its deadline has passed
    ///
    /// # Errors
    ///
    /// * `Cancelled` - the token was cancelled
    /// * `TransactionTimeout` - the deadline has passed
    pub fn check(&self) -> Result<(), LedgerError> {
        if self
            .token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(LedgerError::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(LedgerError::TransactionTimeout {
                    elapsed_ms: millis(now.duration_since(self.started)),
                });
            }
        }

        Ok(())
    }

    /// Time left before the deadline, `None` without one
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for TxnControl {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// One open atomic scope holding exclusive locks on its account rows
///
/// Reads through the store traits see the committed state plus this scope's
/// own staged writes. Calls for accounts outside the lock set fail with
/// `NotInLockSet`.
pub struct LedgerTxn<'a> {
    storage: &'a Storage,
    rows: BTreeMap<AccountId, RwLockWriteGuard<'a, Account>>,
    missing: BTreeSet<AccountId>,
    balances: BTreeMap<AccountId, Coins>,
    quantities: BTreeMap<(AccountId, ItemType), u64>,
    appended: Vec<TransactionRecord>,
}

impl<'a> LedgerTxn<'a> {
    pub(crate) fn new(
        storage: &'a Storage,
        rows: BTreeMap<AccountId, RwLockWriteGuard<'a, Account>>,
        missing: BTreeSet<AccountId>,
    ) -> Self {
        LedgerTxn {
            storage,
            rows,
            missing,
            balances: BTreeMap::new(),
            quantities: BTreeMap::new(),
            appended: Vec::new(),
        }
    }

    /// Apply every staged write
    ///
    /// Staged values were validated when they were written, so applying them
    /// cannot fail. Row locks are released when the scope is dropped at the end.
    pub(crate) fn commit(self) {
        let LedgerTxn {
            storage,
            mut rows,
            balances,
            quantities,
            appended,
            ..
        } = self;

        for (account, balance) in balances {
            if let Some(row) = rows.get_mut(&account) {
                row.balance = balance;
            }
        }

        for ((account, item), quantity) in quantities {
            storage.set_quantity(account, item, quantity);
        }

        for record in appended {
            storage.insert_record(record);
        }
    }

    fn unlocked(&self, account: AccountId) -> LedgerError {
        if self.missing.contains(&account) || !self.storage.contains(account) {
            LedgerError::account_not_found(account, AccountSide::Subject)
        } else {
            LedgerError::NotInLockSet { account }
        }
    }

    fn ensure_locked(&self, account: AccountId) -> Result<(), LedgerError> {
        if self.rows.contains_key(&account) {
            Ok(())
        } else {
            Err(self.unlocked(account))
        }
    }

    fn quantity(&self, account: AccountId, item: &str) -> u64 {
        self.quantities
            .get(&(account, item.to_string()))
            .copied()
            .unwrap_or_else(|| self.storage.quantity(account, item))
    }
}

impl AccountStore for LedgerTxn<'_> {
    fn balance(&self, account: AccountId) -> Result<Coins, LedgerError> {
        if let Some(balance) = self.balances.get(&account) {
            return Ok(*balance);
        }

        self.rows
            .get(&account)
            .map(|row| row.balance)
            .ok_or_else(|| self.unlocked(account))
    }

    fn apply_delta(&mut self, account: AccountId, delta: Coins) -> Result<Coins, LedgerError> {
        let balance = self.balance(account)?;

        let updated = balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::arithmetic_overflow("balance update", account))?;

        if updated < 0 {
            return Err(LedgerError::BalanceUnderflow {
                account,
                balance,
                delta,
            });
        }

        self.balances.insert(account, updated);
        Ok(updated)
    }
}

impl InventoryReader for LedgerTxn<'_> {
    fn entry(&self, account: AccountId, item: &str) -> Result<Option<InventoryEntry>, LedgerError> {
        self.ensure_locked(account)?;

        let quantity = self.quantity(account, item);
        Ok((quantity > 0).then(|| InventoryEntry {
            account,
            item_type: item.to_string(),
            quantity,
        }))
    }

    fn entries(&self, account: AccountId) -> Result<Vec<InventoryEntry>, LedgerError> {
        self.ensure_locked(account)?;

        let mut owned: BTreeMap<ItemType, u64> = self
            .storage
            .inventory_of(account)
            .into_iter()
            .map(|entry| (entry.item_type, entry.quantity))
            .collect();
        for ((staged_account, item), quantity) in &self.quantities {
            if *staged_account == account {
                owned.insert(item.clone(), *quantity);
            }
        }

        Ok(owned
            .into_iter()
            .map(|(item_type, quantity)| InventoryEntry {
                account,
                item_type,
                quantity,
            })
            .collect())
    }
}

impl InventoryStore for LedgerTxn<'_> {
    fn upsert_increment(
        &mut self,
        account: AccountId,
        item: &str,
        by: u64,
    ) -> Result<InventoryEntry, LedgerError> {
        if by == 0 {
            return Err(LedgerError::InvalidQuantity { quantity: by });
        }
        self.ensure_locked(account)?;

        let quantity = self
            .quantity(account, item)
            .checked_add(by)
            .ok_or_else(|| LedgerError::arithmetic_overflow("inventory increment", account))?;

        self.quantities
            .insert((account, item.to_string()), quantity);

        Ok(InventoryEntry {
            account,
            item_type: item.to_string(),
            quantity,
        })
    }
}

impl TransactionLog for LedgerTxn<'_> {
    fn append(
        &mut self,
        kind: TransactionKind,
        amount: Coins,
    ) -> Result<TransactionId, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::invalid_amount(amount));
        }

        if let TransactionKind::Transfer { from, to } = kind {
            if from == to {
                return Err(LedgerError::self_transfer(from));
            }
            self.ensure_locked(to)?;
        }
        self.ensure_locked(kind.from())?;

        let id = self.storage.allocate_transaction_id();
        self.appended.push(TransactionRecord {
            id,
            kind,
            amount,
            created_at: Utc::now(),
        });

        Ok(id)
    }
}

impl HistoryReader for LedgerTxn<'_> {
    fn list_for_account(&self, account: AccountId) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.ensure_locked(account)?;

        let mut records = self.storage.records_for(account)?;
        records.extend(
            self.appended
                .iter()
                .filter(|record| record.kind.involves(account))
                .cloned(),
        );

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::StorageConfig;
    use rstest::rstest;

    fn storage_with(balances: &[(&str, Coins)]) -> Storage {
        let storage = Storage::new(StorageConfig::default());
        for (name, balance) in balances {
            storage.register_account(name, *balance).unwrap();
        }
        storage
    }

    #[test]
    fn test_control_without_limits_passes() {
        assert!(TxnControl::new().check().is_ok());
        assert_eq!(TxnControl::new().remaining(), None);
    }

    #[test]
    fn test_control_reports_cancellation() {
        let token = CancellationToken::new();
        let control = TxnControl::new().with_cancellation(token.clone());
        assert!(control.check().is_ok());

        token.cancel();
        assert_eq!(control.check(), Err(LedgerError::Cancelled));
    }

    #[test]
    fn test_control_reports_expired_deadline() {
        let control = TxnControl::new().with_timeout(Duration::ZERO);
        assert!(matches!(
            control.check(),
            Err(LedgerError::TransactionTimeout { .. })
        ));
        assert_eq!(control.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_reads_see_staged_writes() {
        let storage = storage_with(&[("alice", 100)]);

        storage
            .transaction(&[1], |txn| {
                txn.apply_delta(1, -30)?;
                assert_eq!(txn.balance(1)?, 70);

                txn.upsert_increment(1, "cup", 1)?;
                txn.upsert_increment(1, "cup", 2)?;
                assert_eq!(txn.entry(1, "cup")?.map(|e| e.quantity), Some(3));
                txn.upsert_increment(1, "book", 1)?;
                let owned: Vec<(String, u64)> = txn
                    .entries(1)?
                    .into_iter()
                    .map(|e| (e.item_type, e.quantity))
                    .collect();
                assert_eq!(owned, vec![("book".to_string(), 1), ("cup".to_string(), 3)]);

                txn.append(TransactionKind::Purchase { from: 1 }, 30)?;
                assert_eq!(txn.list_for_account(1)?.len(), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(storage.account(1).unwrap().balance, 70);
    }

    #[rstest]
    #[case::underflow(-101)]
    #[case::overflow(Coins::MAX)]
    fn test_apply_delta_rejects_invalid_results(#[case] delta: Coins) {
        let storage = storage_with(&[("alice", 100)]);

        let result = storage.transaction(&[1], |txn| txn.apply_delta(1, delta));

        assert!(result.is_err());
        assert_eq!(storage.account(1).unwrap().balance, 100);
    }

    #[test]
    fn test_unlocked_account_is_rejected() {
        let storage = storage_with(&[("alice", 100), ("bob", 100)]);

        let result = storage.transaction(&[1], |txn| txn.balance(2));
        assert_eq!(result, Err(LedgerError::NotInLockSet { account: 2 }));

        let result = storage.transaction(&[1], |txn| txn.apply_delta(2, 1));
        assert_eq!(result, Err(LedgerError::NotInLockSet { account: 2 }));
    }

    #[test]
    fn test_missing_account_is_not_found() {
        let storage = storage_with(&[("alice", 100)]);

        let result = storage.transaction(&[1, 9], |txn| txn.balance(9));

        assert_eq!(
            result,
            Err(LedgerError::account_not_found(9, AccountSide::Subject))
        );
    }

    #[rstest]
    #[case::zero_amount(TransactionKind::Purchase { from: 1 }, 0)]
    #[case::negative_amount(TransactionKind::Purchase { from: 1 }, -4)]
    #[case::self_transfer(TransactionKind::Transfer { from: 1, to: 1 }, 10)]
    fn test_append_rejects_invalid_records(#[case] kind: TransactionKind, #[case] amount: Coins) {
        let storage = storage_with(&[("alice", 100)]);

        let result = storage.transaction(&[1], |txn| txn.append(kind, amount));

        assert_eq!(result.map_err(|e| e.kind()), Err(crate::types::ErrorKind::Validation));
        assert_eq!(storage.transaction_count(), 0);
    }

    #[test]
    fn test_zero_increment_is_rejected() {
        let storage = storage_with(&[("alice", 100)]);

        let result = storage.transaction(&[1], |txn| txn.upsert_increment(1, "cup", 0));

        assert_eq!(result, Err(LedgerError::InvalidQuantity { quantity: 0 }));
    }
}
