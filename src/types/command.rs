//! Ledger commands replayed by the command engine
//!
//! Commands address accounts by display name, the way a request handler
//! would before resolving them to identifiers.

use super::account::Coins;
use super::catalog::ItemType;

/// One input command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    /// Create an account; `None` uses the configured starting balance
    Register { name: String, balance: Option<Coins> },

    /// Move `amount` coins from `from` to `to`
    Transfer {
        from: String,
        to: String,
        amount: Coins,
    },

    /// Buy one unit of `item` for `account`
    Purchase { account: String, item: ItemType },
}

impl LedgerCommand {
    /// Lowercase command name, as written in the input file
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCommand::Register { .. } => "register",
            LedgerCommand::Transfer { .. } => "transfer",
            LedgerCommand::Purchase { .. } => "purchase",
        }
    }

    /// Account names this command touches
    ///
    /// Used to partition batches into independent groups.
    pub fn account_names(&self) -> Vec<&str> {
        match self {
            LedgerCommand::Register { name, .. } => vec![name.as_str()],
            LedgerCommand::Transfer { from, to, .. } => vec![from.as_str(), to.as_str()],
            LedgerCommand::Purchase { account, .. } => vec![account.as_str()],
        }
    }
}
