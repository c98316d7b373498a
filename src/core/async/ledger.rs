//! Async facade over the ledger core
//!
//! Ledger operations block their thread while they hold row locks, so the
//! facade runs each one on tokio's blocking pool.
//!
//! # Cancellation
//!
//! Every operation gets a fresh `CancellationToken` wired into its
//! [`TxnControl`]. The token's drop guard lives in the returned future: if the
//! caller drops the future (for example on a request timeout) the token is
//! cancelled and the operation aborts at its next check, before it commits.
//! An operation already past its commit point completes regardless.

use crate::core::ledger::Ledger;
use crate::core::report::ReportBuilder;
use crate::core::txn::TxnControl;
use crate::types::{AccountId, AccountReport, Coins, ItemType, LedgerError, TransactionId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Async front of a [`Ledger`] and a [`ReportBuilder`]
///
/// Cheap to clone; clones share the same ledger.
#[derive(Clone)]
pub struct AsyncLedger {
    ledger: Arc<Ledger>,
    reports: Arc<ReportBuilder>,
    timeout: Option<Duration>,
}

impl AsyncLedger {
    /// Create a facade with no operation deadline
    pub fn new(ledger: Arc<Ledger>, reports: Arc<ReportBuilder>) -> Self {
        Self {
            ledger,
            reports,
            timeout: None,
        }
    }

    /// Abort operations that have not committed within `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transfer `amount` coins from `from` to `to`
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<TransactionId, LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        self.run(move |control| ledger.transfer_with(from, to, amount, control))
            .await
    }

    /// Buy one unit of `item` for `account`
    pub async fn purchase(
        &self,
        account: AccountId,
        item: impl Into<ItemType>,
    ) -> Result<TransactionId, LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        let item = item.into();
        self.run(move |control| ledger.purchase_with(account, &item, control))
            .await
    }

    /// Send coins to the account called `to_name`
    pub async fn send_coins(
        &self,
        from: AccountId,
        to_name: impl Into<String>,
        amount: Coins,
    ) -> Result<TransactionId, LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        let to_name = to_name.into();
        self.run(move |control| ledger.send_coins_with(from, &to_name, amount, control))
            .await
    }

    /// Build the report of `account` on the blocking pool
    pub async fn build_report(&self, account: AccountId) -> Result<AccountReport, LedgerError> {
        let reports = Arc::clone(&self.reports);
        tokio::task::spawn_blocking(move || reports.build_report(account))
            .await
            .map_err(|e| LedgerError::storage(format!("Report task failed: {}", e)))?
    }

    /// Run a ledger operation with a cancellation token tied to this future
    async fn run<T, F>(&self, op: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&TxnControl) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let token = CancellationToken::new();
        let mut control = TxnControl::new().with_cancellation(token.clone());
        if let Some(timeout) = self.timeout {
            control = control.with_timeout(timeout);
        }

        let _cancel_on_drop = token.drop_guard();
        tokio::task::spawn_blocking(move || op(&control))
            .await
            .map_err(|e| LedgerError::storage(format!("Ledger task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::StaticCatalog;
    use crate::core::storage::{Storage, StorageConfig};
    use crate::core::traits::AccountStore;
    use std::sync::mpsc;
    use std::thread;

    fn setup(lock_timeout: Duration) -> (Arc<Storage>, AsyncLedger) {
        let storage = Arc::new(Storage::new(StorageConfig {
            lock_timeout,
            ..StorageConfig::default()
        }));
        storage.register_account("alice", 1000).unwrap();
        storage.register_account("bob", 1000).unwrap();

        let ledger = Arc::new(Ledger::new(
            Arc::clone(&storage),
            Arc::new(StaticCatalog::merch()),
        ));
        let reports = Arc::new(ReportBuilder::new(Arc::clone(&storage)));
        (storage, AsyncLedger::new(ledger, reports))
    }

    #[tokio::test]
    async fn test_operations_commit() {
        let (storage, ledger) = setup(Duration::from_millis(250));

        ledger.transfer(1, 2, 200).await.unwrap();
        ledger.purchase(2, "t-shirt").await.unwrap();
        ledger.send_coins(2, "alice", 20).await.unwrap();

        let report = ledger.build_report(2).await.unwrap();
        assert_eq!(report.coins, 1100);
        assert_eq!(report.inventory.len(), 1);
        assert_eq!(storage.transaction_count(), 3);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let (_storage, ledger) = setup(Duration::from_millis(250));

        assert_eq!(
            ledger.transfer(1, 1, 10).await,
            Err(LedgerError::self_transfer(1))
        );
        assert_eq!(
            ledger.purchase(1, "yacht").await,
            Err(LedgerError::item_not_found("yacht"))
        );
    }

    #[tokio::test]
    async fn test_deadline_aborts_waiting_operation() {
        let (storage, ledger) = setup(Duration::from_secs(5));
        let ledger = ledger.with_timeout(Some(Duration::from_millis(40)));

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage
                    .transaction(&[1], |txn| {
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        txn.balance(1)
                    })
                    .unwrap();
            })
        };
        locked_rx.recv().unwrap();

        let result = ledger.transfer(1, 2, 100).await;
        release_tx.send(()).unwrap();
        holder.join().unwrap();

        assert!(matches!(result, Err(LedgerError::TransactionTimeout { .. })));
        assert_eq!(storage.account(1).unwrap().balance, 1000);
        assert_eq!(storage.transaction_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_future_cancels_operation() {
        let (storage, ledger) = setup(Duration::from_secs(5));

        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage
                    .transaction(&[1], |txn| {
                        locked_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        txn.balance(1)
                    })
                    .unwrap();
            })
        };
        locked_rx.recv().unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(30), ledger.transfer(1, 2, 100)).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        release_tx.send(()).unwrap();
        holder.join().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(storage.account(1).unwrap().balance, 1000);
        assert_eq!(storage.account(2).unwrap().balance, 1000);
        assert_eq!(storage.transaction_count(), 0);
    }
}
