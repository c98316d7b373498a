//! Account report builder
//!
//! Joins an account's balance, inventory and coin history into one
//! [`AccountReport`]. The three reads come from a single consistent view of
//! the account, so a report never contains a transaction record without the
//! balance change it belongs to.
//!
//! Counterparty names are resolved after the view is released, with one
//! batched directory call. Name resolution is for display only: when it fails
//! the report uses a placeholder name instead of failing.

use crate::core::storage::{AccountView, Storage};
use crate::core::traits::{AccountDirectory, HistoryReader, InventoryReader};
use crate::types::{
    AccountId, AccountReport, CoinHistory, Coins, InventoryEntry, InventoryItem, LedgerError,
    ReceivedEntry, SentEntry, TransactionKind, TransactionRecord, SHOP_LABEL,
    UNKNOWN_COUNTERPARTY,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use tracing::{instrument, warn};

/// Committed state of one account, read under its shared row lock
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    balance: Coins,
    inventory: Vec<InventoryEntry>,
    history: Vec<TransactionRecord>,
}

/// Builds account reports from committed state
pub struct ReportBuilder {
    storage: Arc<Storage>,
    directory: Arc<dyn AccountDirectory>,
    parallel_fetch: bool,
}

impl ReportBuilder {
    /// Create a builder that resolves display names through `storage`
    pub fn new(storage: Arc<Storage>) -> Self {
        let directory: Arc<dyn AccountDirectory> = storage.clone();
        ReportBuilder {
            storage,
            directory,
            parallel_fetch: false,
        }
    }

    /// Resolve display names through another directory
    pub fn with_directory(mut self, directory: Arc<dyn AccountDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Fetch inventory and history on two scoped threads
    ///
    /// Off by default: each report then starts two OS threads.
    pub fn with_parallel_fetch(mut self, parallel_fetch: bool) -> Self {
        self.parallel_fetch = parallel_fetch;
        self
    }

    /// Build the report of `account`
    ///
    /// # Arguments
    ///
    /// * `account` - The account to report on
    ///
    /// # Returns
    ///
    /// The balance, the inventory sorted by item type, and the coin history
    /// in commit order split into sent and received entries
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - no such account
    /// * `LockTimeout` - a writer held the account row for too long
    /// * `Storage` - the account's history could not be read
    #[instrument(skip(self), level = "debug")]
    pub fn build_report(&self, account: AccountId) -> Result<AccountReport, LedgerError> {
        let snapshot = self
            .storage
            .read_account(account, |view| self.fetch(view))?;

        let names = self.counterparty_names(account, &snapshot.history);

        Ok(AccountReport {
            coins: snapshot.balance,
            inventory: snapshot
                .inventory
                .into_iter()
                .map(|entry| InventoryItem {
                    item_type: entry.item_type,
                    quantity: entry.quantity,
                })
                .collect(),
            coin_history: classify(account, &snapshot.history, &names),
        })
    }

    fn fetch(&self, view: &AccountView<'_>) -> Result<Snapshot, LedgerError> {
        let account = view.account().id;
        let balance = view.balance();

        let (inventory, history) = if self.parallel_fetch {
            thread::scope(|scope| {
                let inventory = scope.spawn(|| view.entries(account));
                let history = scope.spawn(|| view.list_for_account(account));

                let inventory = inventory
                    .join()
                    .map_err(|_| LedgerError::storage("inventory fetch panicked"))??;
                let history = history
                    .join()
                    .map_err(|_| LedgerError::storage("history fetch panicked"))??;

                Ok::<_, LedgerError>((inventory, history))
            })?
        } else {
            (view.entries(account)?, view.list_for_account(account)?)
        };

        Ok(Snapshot {
            balance,
            inventory,
            history,
        })
    }

    /// Resolve the distinct transfer counterparties of `account` in one call
    fn counterparty_names(
        &self,
        account: AccountId,
        history: &[TransactionRecord],
    ) -> HashMap<AccountId, String> {
        let ids: Vec<AccountId> = history
            .iter()
            .filter_map(|record| counterparty(account, &record.kind))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ids.is_empty() {
            return HashMap::new();
        }

        match self.directory.display_names(&ids) {
            Ok(names) => names,
            Err(error) => {
                warn!(account, %error, "counterparty name lookup failed");
                HashMap::new()
            }
        }
    }
}

/// The other side of a transfer record, `None` for purchases
fn counterparty(account: AccountId, kind: &TransactionKind) -> Option<AccountId> {
    match *kind {
        TransactionKind::Transfer { from, to } if from == account && to != account => Some(to),
        TransactionKind::Transfer { from, to } if to == account && from != account => Some(from),
        _ => None,
    }
}

fn classify(
    account: AccountId,
    history: &[TransactionRecord],
    names: &HashMap<AccountId, String>,
) -> CoinHistory {
    let name_of = |id: AccountId| {
        names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COUNTERPARTY.to_string())
    };

    let mut coin_history = CoinHistory::default();
    for record in history {
        match record.kind {
            TransactionKind::Transfer { from, to } if from == account => {
                coin_history.sent.push(SentEntry {
                    to_user: name_of(to),
                    amount: record.amount,
                });
            }
            TransactionKind::Transfer { from, to } if to == account => {
                coin_history.received.push(ReceivedEntry {
                    from_user: name_of(from),
                    amount: record.amount,
                });
            }
            TransactionKind::Purchase { from } if from == account => {
                coin_history.sent.push(SentEntry {
                    to_user: SHOP_LABEL.to_string(),
                    amount: record.amount,
                });
            }
            _ => {}
        }
    }
    coin_history
}
