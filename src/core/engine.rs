//! Command engine
//!
//! The command engine replays [`LedgerCommand`]s against one storage handle.
//! It stands where a request handler would: commands name accounts by display
//! name, the engine resolves the acting account and hands off to the ledger
//! core. It also owns the read side used to produce the final output.

use crate::config::LedgerConfig;
use crate::core::r#async::AsyncLedger;
use crate::core::ledger::Ledger;
use crate::core::report::ReportBuilder;
use crate::core::storage::{Storage, StorageConfig};
use crate::core::traits::{AccountDirectory, Catalog};
use crate::core::txn::TxnControl;
use crate::types::{Account, AccountId, Coins, LedgerCommand, LedgerError, NamedReport, TransactionId};
use std::sync::Arc;
use tracing::debug;

/// Effect of one successfully processed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A new account was created
    Registered(AccountId),
    /// A ledger operation committed
    Committed(TransactionId),
}

/// Replays commands against one ledger
pub struct LedgerEngine {
    config: LedgerConfig,
    storage: Arc<Storage>,
    ledger: Arc<Ledger>,
    reports: Arc<ReportBuilder>,
    async_ledger: AsyncLedger,
}

impl LedgerEngine {
    /// Create an engine with empty storage
    ///
    /// # Arguments
    ///
    /// * `config` - Starting balance, lock and transaction timeouts, report settings
    /// * `catalog` - Item prices used by purchases
    pub fn new(config: LedgerConfig, catalog: Arc<dyn Catalog>) -> Self {
        let storage = Arc::new(Storage::new(StorageConfig::from(&config)));
        let ledger = Arc::new(Ledger::new(Arc::clone(&storage), catalog));
        let reports = Arc::new(
            ReportBuilder::new(Arc::clone(&storage))
                .with_parallel_fetch(config.parallel_report_fetch),
        );
        let async_ledger = AsyncLedger::new(Arc::clone(&ledger), Arc::clone(&reports))
            .with_timeout(config.transaction_timeout());

        LedgerEngine {
            config,
            storage,
            ledger,
            reports,
            async_ledger,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Process one command on the calling thread
    ///
    /// # Arguments
    ///
    /// * `command` - The command to process
    ///
    /// # Returns
    ///
    /// * `Ok(CommandOutcome)` if the command took effect
    /// * `Err(LedgerError)` if it was rejected; nothing was written
    pub fn process(&self, command: LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        debug!(command = command.name(), "processing command");

        match command {
            LedgerCommand::Register { name, balance } => self.register(&name, balance),
            LedgerCommand::Transfer { from, to, amount } => {
                let from = self.resolve(&from)?;
                self.ledger
                    .send_coins_with(from, &to, amount, &self.control())
                    .map(CommandOutcome::Committed)
            }
            LedgerCommand::Purchase { account, item } => {
                let account = self.resolve(&account)?;
                self.ledger
                    .purchase_with(account, &item, &self.control())
                    .map(CommandOutcome::Committed)
            }
        }
    }

    /// Process one command, running ledger operations on the blocking pool
    ///
    /// Must be called from within a tokio runtime.
    pub async fn process_async(&self, command: LedgerCommand) -> Result<CommandOutcome, LedgerError> {
        debug!(command = command.name(), "processing command");

        match command {
            LedgerCommand::Register { name, balance } => self.register(&name, balance),
            LedgerCommand::Transfer { from, to, amount } => {
                let from = self.resolve(&from)?;
                self.async_ledger
                    .send_coins(from, to, amount)
                    .await
                    .map(CommandOutcome::Committed)
            }
            LedgerCommand::Purchase { account, item } => {
                let account = self.resolve(&account)?;
                self.async_ledger
                    .purchase(account, item)
                    .await
                    .map(CommandOutcome::Committed)
            }
        }
    }

    /// Every account, sorted by id
    pub fn balances(&self) -> Result<Vec<Account>, LedgerError> {
        self.storage.accounts()
    }

    /// One report per account, sorted by account id
    pub fn reports(&self) -> Result<Vec<NamedReport>, LedgerError> {
        self.storage
            .accounts()?
            .into_iter()
            .map(|account| {
                self.reports.build_report(account.id).map(|report| NamedReport {
                    user: account.name,
                    report,
                })
            })
            .collect()
    }

    /// Close the storage handle
    pub fn shutdown(&self) {
        self.storage.close();
    }

    fn register(&self, name: &str, balance: Option<Coins>) -> Result<CommandOutcome, LedgerError> {
        let balance = balance.unwrap_or(self.config.starting_balance);
        self.storage
            .register_account(name, balance)
            .map(CommandOutcome::Registered)
    }

    fn resolve(&self, name: &str) -> Result<AccountId, LedgerError> {
        self.storage
            .find_by_name(name)?
            .ok_or_else(|| LedgerError::unknown_account_name(name))
    }

    fn control(&self) -> TxnControl {
        match self.config.transaction_timeout() {
            Some(timeout) => TxnControl::new().with_timeout(timeout),
            None => TxnControl::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::StaticCatalog;
    use crate::types::ErrorKind;
    use rstest::rstest;

    fn engine() -> LedgerEngine {
        LedgerEngine::new(LedgerConfig::default(), Arc::new(StaticCatalog::merch()))
    }

    fn register(name: &str, balance: Option<i64>) -> LedgerCommand {
        LedgerCommand::Register {
            name: name.to_string(),
            balance,
        }
    }

    fn transfer(from: &str, to: &str, amount: i64) -> LedgerCommand {
        LedgerCommand::Transfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        }
    }

    fn purchase(account: &str, item: &str) -> LedgerCommand {
        LedgerCommand::Purchase {
            account: account.to_string(),
            item: item.to_string(),
        }
    }

    #[test]
    fn test_register_uses_configured_starting_balance() {
        let engine = LedgerEngine::new(
            LedgerConfig {
                starting_balance: 300,
                ..LedgerConfig::default()
            },
            Arc::new(StaticCatalog::merch()),
        );

        assert_eq!(
            engine.process(register("alice", None)),
            Ok(CommandOutcome::Registered(1))
        );
        assert_eq!(
            engine.process(register("bob", Some(5))),
            Ok(CommandOutcome::Registered(2))
        );

        let balances: Vec<i64> = engine.balances().unwrap().iter().map(|a| a.balance).collect();
        assert_eq!(balances, vec![300, 5]);
    }

    #[test]
    fn test_commands_by_name() {
        let engine = engine();
        engine.process(register("alice", None)).unwrap();
        engine.process(register("bob", None)).unwrap();

        assert!(matches!(
            engine.process(transfer("alice", "bob", 200)),
            Ok(CommandOutcome::Committed(_))
        ));
        assert!(matches!(
            engine.process(purchase("bob", "hoody")),
            Ok(CommandOutcome::Committed(_))
        ));

        let balances: Vec<(String, i64)> = engine
            .balances()
            .unwrap()
            .into_iter()
            .map(|a| (a.name, a.balance))
            .collect();
        assert_eq!(
            balances,
            vec![("alice".to_string(), 800), ("bob".to_string(), 900)]
        );
    }

    #[rstest]
    #[case::unknown_sender(transfer("eve", "alice", 10), ErrorKind::NotFound)]
    #[case::unknown_recipient(transfer("alice", "eve", 10), ErrorKind::NotFound)]
    #[case::unknown_buyer(purchase("eve", "cup"), ErrorKind::NotFound)]
    #[case::unknown_item(purchase("alice", "yacht"), ErrorKind::NotFound)]
    #[case::self_transfer(transfer("alice", "alice", 10), ErrorKind::Validation)]
    #[case::duplicate(register("alice", None), ErrorKind::Validation)]
    #[case::too_expensive(transfer("alice", "bob", 5000), ErrorKind::InsufficientFunds)]
    fn test_rejected_commands(#[case] command: LedgerCommand, #[case] expected: ErrorKind) {
        let engine = engine();
        engine.process(register("alice", None)).unwrap();
        engine.process(register("bob", None)).unwrap();

        let result = engine.process(command);

        assert_eq!(result.map_err(|e| e.kind()), Err(expected));
        assert_eq!(engine.storage().transaction_count(), 0);
    }

    #[test]
    fn test_reports_follow_account_order() {
        let engine = engine();
        engine.process(register("alice", Some(100))).unwrap();
        engine.process(register("bob", Some(100))).unwrap();
        engine.process(purchase("alice", "t-shirt")).unwrap();
        engine.process(transfer("bob", "alice", 50)).unwrap();

        let reports = engine.reports().unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].user, "alice");
        assert_eq!(reports[0].report.coins, 70);
        assert_eq!(reports[1].user, "bob");
        assert_eq!(reports[1].report.coin_history.sent[0].to_user, "alice");
    }

    #[tokio::test]
    async fn test_process_async_matches_process() {
        let engine = engine();
        engine.process_async(register("alice", None)).await.unwrap();
        engine.process_async(register("bob", None)).await.unwrap();
        engine
            .process_async(transfer("alice", "bob", 250))
            .await
            .unwrap();
        engine.process_async(purchase("alice", "cup")).await.unwrap();

        let result = engine.process_async(purchase("carol", "cup")).await;
        assert_eq!(result, Err(LedgerError::unknown_account_name("carol")));

        let balances: Vec<i64> = engine.balances().unwrap().iter().map(|a| a.balance).collect();
        assert_eq!(balances, vec![730, 1250]);
    }

    #[test]
    fn test_shutdown_rejects_further_commands() {
        let engine = engine();
        engine.process(register("alice", None)).unwrap();

        engine.shutdown();

        assert_eq!(
            engine.process(register("bob", None)),
            Err(LedgerError::StorageClosed)
        );
    }
}
