//! Storage handle for accounts, inventory and the transaction log
//!
//! `Storage` is the persistence transport of the ledger: an explicitly
//! constructed, shared handle that opens atomic transactional scopes spanning
//! the account, inventory and transaction stores.
//!
//! # Concurrency
//!
//! Every account row sits behind its own `parking_lot::RwLock`. A write
//! transaction locks all of its rows exclusively, in ascending account id
//! order, before any read or write happens. Inventory entries and history
//! entries of an account are only changed while that account's row is
//! write-locked, so a reader holding the row's shared lock sees a consistent
//! snapshot of balance, inventory and history together.
//!
//! The index maps (`DashMap`) are only ever locked for the duration of one
//! lookup or insert, never while waiting for a row lock.

use crate::config::LedgerConfig;
use crate::core::traits::{AccountDirectory, HistoryReader, InventoryReader};
use crate::core::txn::{millis, LedgerTxn, TxnControl};
use crate::types::{
    Account, AccountId, AccountSide, Coins, InventoryEntry, ItemType, LedgerError, TransactionId,
    TransactionRecord,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Longest single wait on a row lock before the control is checked again
const LOCK_SLICE: Duration = Duration::from_millis(10);

/// Storage settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Maximum wait for one row lock of a write transaction
    pub lock_timeout: Duration,

    /// Maximum wait for the shared row lock of a read
    ///
    /// Writers only hold a row until they commit or hit their deadline, so
    /// this is set well above `lock_timeout`.
    pub read_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            lock_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&LedgerConfig> for StorageConfig {
    fn from(config: &LedgerConfig) -> Self {
        StorageConfig {
            lock_timeout: config.lock_timeout(),
            read_timeout: config.read_timeout(),
        }
    }
}

/// Shared in-memory storage with row-level locking
#[derive(Debug)]
pub struct Storage {
    config: StorageConfig,

    /// Account rows by id
    rows: DashMap<AccountId, Arc<RwLock<Account>>>,

    /// Name index used by identity resolution
    names: DashMap<String, AccountId>,

    /// Display names by id
    labels: DashMap<AccountId, String>,

    /// Owned quantities per account, sorted by item type
    inventory: DashMap<AccountId, BTreeMap<ItemType, u64>>,

    /// Committed records by id
    records: DashMap<TransactionId, TransactionRecord>,

    /// Ids of committed records per involved account, in commit order
    history: DashMap<AccountId, Vec<TransactionId>>,

    next_account_id: AtomicU64,
    next_transaction_id: AtomicU64,
    open: AtomicBool,
}

impl Storage {
    /// Create an empty storage handle
    pub fn new(config: StorageConfig) -> Self {
        Storage {
            config,
            rows: DashMap::new(),
            names: DashMap::new(),
            labels: DashMap::new(),
            inventory: DashMap::new(),
            records: DashMap::new(),
            history: DashMap::new(),
            next_account_id: AtomicU64::new(1),
            next_transaction_id: AtomicU64::new(1),
            open: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Register a new account
    ///
    /// # Arguments
    ///
    /// * `name` - Unique display name, must not be blank
    /// * `balance` - Starting balance, must not be negative
    ///
    /// # Returns
    ///
    /// The id assigned to the account
    ///
    /// # Errors
    ///
    /// * `InvalidAccountName` - the name is blank
    /// * `InvalidAmount` - the balance is negative
    /// * `DuplicateAccount` - the name is already taken
    /// * `StorageClosed` - the handle was closed
    pub fn register_account(&self, name: &str, balance: Coins) -> Result<AccountId, LedgerError> {
        self.ensure_open()?;

        if name.trim().is_empty() {
            return Err(LedgerError::InvalidAccountName {
                name: name.to_string(),
            });
        }
        if balance < 0 {
            return Err(LedgerError::invalid_amount(balance));
        }

        let mut created = false;
        let id = *self.names.entry(name.to_string()).or_insert_with(|| {
            let id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
            self.labels.insert(id, name.to_string());
            self.rows
                .insert(id, Arc::new(RwLock::new(Account::new(id, name, balance))));
            created = true;
            id
        });

        if !created {
            return Err(LedgerError::duplicate_account(name));
        }

        debug!(account = id, name, balance, "account registered");
        Ok(id)
    }

    /// Run `f` inside one atomic scope holding `lock_set` exclusively
    ///
    /// See [`Storage::transaction_with`].
    pub fn transaction<T, F>(&self, lock_set: &[AccountId], f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerTxn<'_>) -> Result<T, LedgerError>,
    {
        self.transaction_with(lock_set, &TxnControl::new(), f)
    }

    /// Run `f` inside one atomic scope holding `lock_set` exclusively
    ///
    /// The lock set is sorted and deduplicated, then each existing row is
    /// locked in ascending id order. Ids without an account are not locked;
    /// store calls for them fail with `AccountNotFound`.
    ///
    /// The staged writes of `f` are applied only if `f` returns `Ok` and the
    /// control passes its final check. Otherwise nothing is written.
    ///
    /// # Arguments
    ///
    /// * `lock_set` - Every account the operation reads or writes
    /// * `control` - Cancellation and deadline of the operation
    /// * `f` - The operation body
    ///
    /// # Errors
    ///
    /// * `StorageClosed` - the handle was closed
    /// * `LockTimeout` - a row lock was not acquired within the lock timeout
    /// * `Cancelled`, `TransactionTimeout` - the control tripped before commit
    /// * any error returned by `f`
    pub fn transaction_with<T, F>(
        &self,
        lock_set: &[AccountId],
        control: &TxnControl,
        f: F,
    ) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut LedgerTxn<'_>) -> Result<T, LedgerError>,
    {
        self.ensure_open()?;

        let mut ids = lock_set.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut handles = Vec::with_capacity(ids.len());
        let mut missing = BTreeSet::new();
        for id in ids {
            match self.rows.get(&id) {
                Some(row) => handles.push((id, Arc::clone(row.value()))),
                None => {
                    missing.insert(id);
                }
            }
        }

        let mut guards = BTreeMap::new();
        for (id, row) in &handles {
            let guard = self.acquire(*id, control, self.config.lock_timeout, |slice| {
                row.try_write_for(slice)
            })?;
            guards.insert(*id, guard);
        }

        let mut txn = LedgerTxn::new(self, guards, missing);
        let value = f(&mut txn)?;

        control.check()?;
        txn.commit();

        Ok(value)
    }

    /// Run `f` against a consistent view of one account
    ///
    /// The account's row is held under a shared lock while `f` runs, so no
    /// ledger operation touching the account can commit in between.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - no such account
    /// * `LockTimeout` - a writer held the row for longer than the read timeout
    /// * `StorageClosed` - the handle was closed
    pub fn read_account<T, F>(&self, account: AccountId, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&AccountView<'_>) -> Result<T, LedgerError>,
    {
        self.ensure_open()?;

        let row = self
            .rows
            .get(&account)
            .map(|row| Arc::clone(row.value()))
            .ok_or_else(|| LedgerError::account_not_found(account, AccountSide::Subject))?;

        let guard = self.acquire(
            account,
            &TxnControl::new(),
            self.config.read_timeout,
            |slice| row.try_read_for(slice),
        )?;
        let view = AccountView {
            account: &guard,
            storage: self,
        };

        f(&view)
    }

    /// Snapshot of one account row
    pub fn account(&self, account: AccountId) -> Result<Account, LedgerError> {
        self.read_account(account, |view| Ok(view.account().clone()))
    }

    /// Snapshot of every account, sorted by id
    pub fn accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.ensure_open()?;

        let mut rows: Vec<(AccountId, Arc<RwLock<Account>>)> = self
            .rows
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        rows.sort_unstable_by_key(|(id, _)| *id);

        let control = TxnControl::new();
        rows.iter()
            .map(|(id, row)| {
                self.acquire(*id, &control, self.config.read_timeout, |slice| {
                    row.try_read_for(slice)
                })
                .map(|guard| guard.clone())
            })
            .collect()
    }

    /// Number of committed transaction records
    pub fn transaction_count(&self) -> usize {
        self.records.len()
    }

    /// Shut the handle down
    ///
    /// New transactions and reads fail with `StorageClosed` afterwards.
    /// Transactions already past their open check finish normally.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            info!(
                accounts = self.rows.len(),
                transactions = self.records.len(),
                "storage closed"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LedgerError::StorageClosed)
        }
    }

    /// Wait for a row lock in short slices, checking `control` between them
    fn acquire<G>(
        &self,
        account: AccountId,
        control: &TxnControl,
        timeout: Duration,
        mut try_lock: impl FnMut(Duration) -> Option<G>,
    ) -> Result<G, LedgerError> {
        let started = Instant::now();
        loop {
            control.check()?;

            let waited = started.elapsed();
            if waited >= timeout {
                debug!(account, waited_ms = millis(waited), "row lock timed out");
                return Err(LedgerError::lock_timeout(account, millis(waited)));
            }

            let slice = (timeout - waited).min(LOCK_SLICE);
            if let Some(guard) = try_lock(slice) {
                return Ok(guard);
            }
            trace!(account, "waiting for row lock");
        }
    }

    pub(crate) fn contains(&self, account: AccountId) -> bool {
        self.rows.contains_key(&account)
    }

    pub(crate) fn allocate_transaction_id(&self) -> TransactionId {
        self.next_transaction_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn quantity(&self, account: AccountId, item: &str) -> u64 {
        self.inventory
            .get(&account)
            .and_then(|items| items.get(item).copied())
            .unwrap_or(0)
    }

    pub(crate) fn set_quantity(&self, account: AccountId, item: ItemType, quantity: u64) {
        self.inventory
            .entry(account)
            .or_default()
            .insert(item, quantity);
    }

    pub(crate) fn insert_record(&self, record: TransactionRecord) {
        let id = record.id;
        let from = record.kind.from();
        let to = record.kind.to();

        self.records.insert(id, record);
        self.history.entry(from).or_default().push(id);
        if let Some(to) = to {
            self.history.entry(to).or_default().push(id);
        }
    }

    pub(crate) fn records_for(
        &self,
        account: AccountId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let ids = self
            .history
            .get(&account)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        ids.into_iter()
            .map(|id| {
                self.records
                    .get(&id)
                    .map(|record| record.value().clone())
                    .ok_or_else(|| {
                        LedgerError::storage(format!(
                            "transaction {} listed for account {} is missing",
                            id, account
                        ))
                    })
            })
            .collect()
    }

    pub(crate) fn inventory_of(&self, account: AccountId) -> Vec<InventoryEntry> {
        self.inventory
            .get(&account)
            .map(|items| {
                items
                    .iter()
                    .map(|(item, quantity)| InventoryEntry {
                        account,
                        item_type: item.clone(),
                        quantity: *quantity,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl AccountDirectory for Storage {
    fn find_by_name(&self, name: &str) -> Result<Option<AccountId>, LedgerError> {
        self.ensure_open()?;
        Ok(self.names.get(name).map(|id| *id.value()))
    }

    fn display_names(&self, ids: &[AccountId]) -> Result<HashMap<AccountId, String>, LedgerError> {
        self.ensure_open()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.labels.get(id).map(|name| (*id, name.value().clone())))
            .collect())
    }
}

/// Consistent read-only view of one account
///
/// Only handed out by [`Storage::read_account`] while the row's shared lock
/// is held. The store reads it implements only answer for that account.
pub struct AccountView<'a> {
    account: &'a Account,
    storage: &'a Storage,
}

impl AccountView<'_> {
    pub fn account(&self) -> &Account {
        self.account
    }

    pub fn balance(&self) -> Coins {
        self.account.balance
    }

    /// Owned items, sorted by item type
    pub fn inventory(&self) -> Vec<InventoryEntry> {
        self.storage.inventory_of(self.account.id)
    }

    /// Records involving the account, in commit order
    pub fn history(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.list_for_account(self.account.id)
    }

    fn ensure_viewed(&self, account: AccountId) -> Result<(), LedgerError> {
        if account == self.account.id {
            Ok(())
        } else {
            Err(LedgerError::NotInLockSet { account })
        }
    }
}

impl InventoryReader for AccountView<'_> {
    fn entry(&self, account: AccountId, item: &str) -> Result<Option<InventoryEntry>, LedgerError> {
        self.ensure_viewed(account)?;

        let quantity = self.storage.quantity(account, item);
        Ok((quantity > 0).then(|| InventoryEntry {
            account,
            item_type: item.to_string(),
            quantity,
        }))
    }

    fn entries(&self, account: AccountId) -> Result<Vec<InventoryEntry>, LedgerError> {
        self.ensure_viewed(account)?;
        Ok(self.storage.inventory_of(account))
    }
}

impl HistoryReader for AccountView<'_> {
    fn list_for_account(&self, account: AccountId) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.ensure_viewed(account)?;
        self.storage.records_for(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{AccountStore, InventoryStore, TransactionLog};
    use crate::types::TransactionKind;
    use rstest::rstest;
    use std::sync::mpsc;
    use std::thread;
    use tokio_util::sync::CancellationToken;

    fn storage() -> Storage {
        Storage::new(StorageConfig::default())
    }

    #[test]
    fn test_register_assigns_ascending_ids() {
        let storage = storage();

        assert_eq!(storage.register_account("alice", 1000).unwrap(), 1);
        assert_eq!(storage.register_account("bob", 500).unwrap(), 2);

        let accounts = storage.accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "alice");
        assert_eq!(accounts[1].balance, 500);
    }

    #[rstest]
    #[case::blank_name("  ", 10)]
    #[case::empty_name("", 10)]
    #[case::negative_balance("carol", -1)]
    fn test_register_rejects_invalid_input(#[case] name: &str, #[case] balance: Coins) {
        let storage = storage();

        let result = storage.register_account(name, balance);

        assert_eq!(
            result.map_err(|e| e.kind()),
            Err(crate::types::ErrorKind::Validation)
        );
        assert!(storage.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_duplicate_name() {
        let storage = storage();
        storage.register_account("alice", 1000).unwrap();

        let result = storage.register_account("alice", 10);

        assert_eq!(result, Err(LedgerError::duplicate_account("alice")));
        assert_eq!(storage.accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_applies_all_writes() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();
        storage.register_account("bob", 100).unwrap();

        let id = storage
            .transaction(&[2, 1], |txn| {
                txn.apply_delta(1, -40)?;
                txn.apply_delta(2, 40)?;
                txn.append(TransactionKind::Transfer { from: 1, to: 2 }, 40)
            })
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(storage.account(1).unwrap().balance, 60);
        assert_eq!(storage.account(2).unwrap().balance, 140);

        let history = storage.read_account(2, |view| view.history()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Transfer { from: 1, to: 2 });
    }

    #[test]
    fn test_error_discards_staged_writes() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();

        let result: Result<(), LedgerError> = storage.transaction(&[1], |txn| {
            txn.apply_delta(1, -50)?;
            txn.upsert_increment(1, "cup", 1)?;
            txn.append(TransactionKind::Purchase { from: 1 }, 50)?;
            Err(LedgerError::storage("disk full"))
        });

        assert!(result.is_err());
        assert_eq!(storage.account(1).unwrap().balance, 100);
        assert_eq!(storage.transaction_count(), 0);
        assert!(storage
            .read_account(1, |view| Ok(view.inventory()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cancellation_before_commit_discards_writes() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();

        let token = CancellationToken::new();
        let control = TxnControl::new().with_cancellation(token.clone());

        let result = storage.transaction_with(&[1], &control, |txn| {
            txn.apply_delta(1, -10)?;
            token.cancel();
            Ok(())
        });

        assert_eq!(result, Err(LedgerError::Cancelled));
        assert_eq!(storage.account(1).unwrap().balance, 100);
    }

    #[test]
    fn test_lock_wait_times_out() {
        let storage = Arc::new(Storage::new(StorageConfig {
            lock_timeout: Duration::from_millis(30),
            ..StorageConfig::default()
        }));
        storage.register_account("alice", 100).unwrap();

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage
                    .transaction(&[1], |_txn| {
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let result = storage.transaction(&[1], |txn| txn.apply_delta(1, -10));
        release_tx.send(()).unwrap();
        holder.join().unwrap();

        assert!(matches!(
            result,
            Err(LedgerError::LockTimeout { account: 1, .. })
        ));
        assert_eq!(storage.account(1).unwrap().balance, 100);
    }

    #[test]
    fn test_read_waits_past_write_lock_timeout() {
        let storage = Arc::new(Storage::new(StorageConfig {
            lock_timeout: Duration::from_millis(20),
            read_timeout: Duration::from_secs(5),
        }));
        storage.register_account("alice", 100).unwrap();

        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage
                    .transaction(&[1], |txn| {
                        txn.apply_delta(1, -40)?;
                        locked_tx.send(()).unwrap();
                        thread::sleep(Duration::from_millis(150));
                        Ok(())
                    })
                    .unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let writer = storage.transaction(&[1], |txn| txn.apply_delta(1, -10));
        let balance = storage.read_account(1, |view| Ok(view.balance()));
        holder.join().unwrap();

        assert!(matches!(
            writer,
            Err(LedgerError::LockTimeout { account: 1, .. })
        ));
        assert_eq!(balance, Ok(60));
    }

    #[test]
    fn test_view_reads_only_its_own_account() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();
        storage.register_account("bob", 100).unwrap();
        storage
            .transaction(&[1], |txn| {
                txn.upsert_increment(1, "cup", 2)?;
                txn.append(TransactionKind::Purchase { from: 1 }, 20)
            })
            .unwrap();

        storage
            .read_account(1, |view| {
                assert_eq!(view.entry(1, "cup")?.map(|e| e.quantity), Some(2));
                assert_eq!(view.entry(1, "pen")?, None);
                assert_eq!(view.entries(1)?.len(), 1);
                assert_eq!(view.list_for_account(1)?.len(), 1);

                assert_eq!(
                    view.entries(2),
                    Err(LedgerError::NotInLockSet { account: 2 })
                );
                assert_eq!(
                    view.list_for_account(2),
                    Err(LedgerError::NotInLockSet { account: 2 })
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_opposite_lock_orders_do_not_deadlock() {
        let storage = Arc::new(storage());
        storage.register_account("alice", 10_000).unwrap();
        storage.register_account("bob", 10_000).unwrap();

        let workers: Vec<_> = [(1, 2), (2, 1)]
            .into_iter()
            .map(|(from, to)| {
                let storage = Arc::clone(&storage);
                thread::spawn(move || {
                    for _ in 0..200 {
                        storage
                            .transaction(&[from, to], |txn| {
                                txn.apply_delta(from, -1)?;
                                txn.apply_delta(to, 1)?;
                                txn.append(TransactionKind::Transfer { from, to }, 1)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(storage.account(1).unwrap().balance, 10_000);
        assert_eq!(storage.account(2).unwrap().balance, 10_000);
        assert_eq!(storage.transaction_count(), 400);
    }

    #[test]
    fn test_closed_storage_rejects_new_work() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();

        storage.close();

        assert!(!storage.is_open());
        assert_eq!(
            storage.transaction(&[1], |txn| txn.balance(1)),
            Err(LedgerError::StorageClosed)
        );
        assert_eq!(storage.account(1), Err(LedgerError::StorageClosed));
        assert_eq!(
            storage.register_account("bob", 1),
            Err(LedgerError::StorageClosed)
        );
        assert_eq!(storage.find_by_name("alice"), Err(LedgerError::StorageClosed));
    }

    #[test]
    fn test_directory_resolves_names() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();
        storage.register_account("bob", 100).unwrap();

        assert_eq!(storage.find_by_name("bob").unwrap(), Some(2));
        assert_eq!(storage.find_by_name("eve").unwrap(), None);

        let names = storage.display_names(&[1, 2, 7]).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[&1], "alice");
        assert_eq!(names[&2], "bob");
    }

    #[test]
    fn test_read_unknown_account() {
        let storage = storage();

        let result = storage.read_account(3, |view| Ok(view.balance()));

        assert_eq!(
            result,
            Err(LedgerError::account_not_found(3, AccountSide::Subject))
        );
    }

    #[test]
    fn test_inventory_view_is_sorted_by_item() {
        let storage = storage();
        storage.register_account("alice", 100).unwrap();

        storage
            .transaction(&[1], |txn| {
                txn.upsert_increment(1, "umbrella", 1)?;
                txn.upsert_increment(1, "cup", 2)?;
                Ok(())
            })
            .unwrap();

        let inventory = storage.read_account(1, |view| Ok(view.inventory())).unwrap();
        let items: Vec<(&str, u64)> = inventory
            .iter()
            .map(|entry| (entry.item_type.as_str(), entry.quantity))
            .collect();
        assert_eq!(items, vec![("cup", 2), ("umbrella", 1)]);
    }
}
