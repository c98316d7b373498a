//! Ledger core: transfers and purchases
//!
//! Each operation runs as one storage transaction. The acting account's
//! balance and the counterpart's existence are read inside the same scope
//! that performs the writes, with every involved row exclusively locked, so
//! no operation can act on a balance a concurrent operation already spent.
//!
//! Operations either commit all of their writes (balance changes, inventory
//! upsert, transaction record) or none of them.

use crate::core::storage::Storage;
use crate::core::traits::{AccountDirectory, AccountStore, Catalog, InventoryStore, TransactionLog};
use crate::core::txn::TxnControl;
use crate::types::{AccountId, AccountSide, Coins, LedgerError, TransactionId, TransactionKind};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Orchestrates transfers and purchases against the storage handle
pub struct Ledger {
    storage: Arc<Storage>,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn AccountDirectory>,
}

impl Ledger {
    /// Create a ledger that resolves account names through `storage`
    pub fn new(storage: Arc<Storage>, catalog: Arc<dyn Catalog>) -> Self {
        let directory: Arc<dyn AccountDirectory> = storage.clone();
        Ledger {
            storage,
            catalog,
            directory,
        }
    }

    /// Resolve account names through another directory
    pub fn with_directory(mut self, directory: Arc<dyn AccountDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn directory(&self) -> &Arc<dyn AccountDirectory> {
        &self.directory
    }

    /// Move `amount` coins from `from` to `to`
    ///
    /// See [`Ledger::transfer_with`].
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<TransactionId, LedgerError> {
        self.transfer_with(from, to, amount, &TxnControl::new())
    }

    /// Move `amount` coins from `from` to `to` in one atomic scope
    ///
    /// Debits `from`, credits `to` and appends a transfer record. Both rows
    /// are locked in ascending id order regardless of direction.
    ///
    /// # Arguments
    ///
    /// * `from` - Account to debit
    /// * `to` - Account to credit
    /// * `amount` - Coins to move, must be positive
    /// * `control` - Cancellation and deadline of the operation
    ///
    /// # Returns
    ///
    /// The id of the appended transaction record
    ///
    /// # Errors
    ///
    /// * `SelfTransfer`, `InvalidAmount` - rejected before any store access
    /// * `AccountNotFound` - either side does not exist, `side` tells which
    /// * `InsufficientFunds` - the balance of `from` is below `amount`
    /// * `LockTimeout`, `Cancelled`, `TransactionTimeout` - aborted, nothing written
    #[instrument(skip(self, control), level = "debug")]
    pub fn transfer_with(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
        control: &TxnControl,
    ) -> Result<TransactionId, LedgerError> {
        let result = validate_transfer(from, to, amount).and_then(|()| {
            self.storage.transaction_with(&[from, to], control, |txn| {
                let balance = txn.balance(from).map_err(|e| e.on_side(AccountSide::Source))?;
                txn.balance(to)
                    .map_err(|e| e.on_side(AccountSide::Destination))?;

                if balance < amount {
                    return Err(LedgerError::insufficient_funds(from, balance, amount));
                }

                txn.apply_delta(from, -amount)?;
                txn.apply_delta(to, amount)?;
                txn.append(TransactionKind::Transfer { from, to }, amount)
            })
        });

        match &result {
            Ok(id) => info!(transaction = id, from, to, amount, "transfer committed"),
            Err(error) => debug!(%error, "transfer rejected"),
        }
        result
    }

    /// Buy one unit of `item` for `account`
    ///
    /// See [`Ledger::purchase_with`].
    pub fn purchase(&self, account: AccountId, item: &str) -> Result<TransactionId, LedgerError> {
        self.purchase_with(account, item, &TxnControl::new())
    }

    /// Buy one unit of `item` for `account` in one atomic scope
    ///
    /// Debits the account by the catalog price, increments its inventory
    /// entry for `item` (creating it at 1) and appends a purchase record.
    /// The shop is a sink: no other balance changes.
    ///
    /// # Errors
    ///
    /// * `ItemNotFound` - `item` is not in the catalog
    /// * `InvalidPrice` - the catalog returned a non-positive price
    /// * `AccountNotFound` - the account does not exist
    /// * `InsufficientFunds` - the balance is below the price
    /// * `LockTimeout`, `Cancelled`, `TransactionTimeout` - aborted, nothing written
    #[instrument(skip(self, control), level = "debug")]
    pub fn purchase_with(
        &self,
        account: AccountId,
        item: &str,
        control: &TxnControl,
    ) -> Result<TransactionId, LedgerError> {
        let result = self.price_of(item).and_then(|price| {
            self.storage.transaction_with(&[account], control, |txn| {
                let balance = txn.balance(account)?;
                if balance < price {
                    return Err(LedgerError::insufficient_funds(account, balance, price));
                }

                txn.apply_delta(account, -price)?;
                txn.upsert_increment(account, item, 1)?;
                txn.append(TransactionKind::Purchase { from: account }, price)
            })
        });

        match &result {
            Ok(id) => info!(transaction = id, account, item, "purchase committed"),
            Err(error) => debug!(%error, "purchase rejected"),
        }
        result
    }

    /// Send coins to the account called `to_name`
    ///
    /// See [`Ledger::send_coins_with`].
    pub fn send_coins(
        &self,
        from: AccountId,
        to_name: &str,
        amount: Coins,
    ) -> Result<TransactionId, LedgerError> {
        self.send_coins_with(from, to_name, amount, &TxnControl::new())
    }

    /// Resolve the recipient by name, then transfer
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - rejected before the name lookup
    /// * `UnknownAccountName` - no account is called `to_name`
    /// * every error of [`Ledger::transfer_with`]
    pub fn send_coins_with(
        &self,
        from: AccountId,
        to_name: &str,
        amount: Coins,
        control: &TxnControl,
    ) -> Result<TransactionId, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::invalid_amount(amount));
        }

        let to = self
            .directory
            .find_by_name(to_name)?
            .ok_or_else(|| LedgerError::unknown_account_name(to_name))?;

        self.transfer_with(from, to, amount, control)
    }

    fn price_of(&self, item: &str) -> Result<Coins, LedgerError> {
        let price = self.catalog.price(item)?;
        if price <= 0 {
            return Err(LedgerError::InvalidPrice {
                item: item.to_string(),
                price,
            });
        }
        Ok(price)
    }
}

fn validate_transfer(from: AccountId, to: AccountId, amount: Coins) -> Result<(), LedgerError> {
    if from == to {
        return Err(LedgerError::self_transfer(from));
    }
    if amount <= 0 {
        return Err(LedgerError::invalid_amount(amount));
    }
    Ok(())
}
