//! Account-related types for the coin ledger
//!
//! This module defines the Account row and the identifiers used to address it.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Account identifier
///
/// Assigned by the storage handle at registration, starting from 1.
pub type AccountId = u64;

/// Coin amount
///
/// Signed so that non-positive request amounts are representable and can be
/// rejected as validation errors. Stored balances are always `>= 0`.
pub type Coins = i64;

/// Account row
///
/// Holds the current coin balance of an account together with the unique
/// display name used by identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Stable account identifier
    pub id: AccountId,

    /// Unique, human-chosen display name
    pub name: String,

    /// Current coin balance
    ///
    /// Never negative. Only changes inside a committed ledger operation.
    pub balance: Coins,

    /// Registration timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account row with the given starting balance
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier assigned by the storage handle
    /// * `name` - The unique display name
    /// * `balance` - The starting balance (must already be validated as `>= 0`)
    pub fn new(id: AccountId, name: impl Into<String>, balance: Coins) -> Self {
        Account {
            id,
            name: name.into(),
            balance,
            created_at: Utc::now(),
        }
    }
}

/// Which side of an operation an account was referenced from
///
/// Carried by `AccountNotFound` so callers can tell which of the two
/// accounts of a transfer is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountSide {
    /// The debited account (transfer sender or purchasing account)
    Source,
    /// The credited account of a transfer
    Destination,
    /// An account referenced outside an operation (store reads, reports)
    Subject,
}

impl AccountSide {
    /// Label used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            AccountSide::Source => "source account",
            AccountSide::Destination => "destination account",
            AccountSide::Subject => "account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_keeps_starting_balance() {
        let account = Account::new(7, "alice", 1000);

        assert_eq!(account.id, 7);
        assert_eq!(account.name, "alice");
        assert_eq!(account.balance, 1000);
    }

    #[test]
    fn test_side_labels() {
        assert_eq!(AccountSide::Source.label(), "source account");
        assert_eq!(AccountSide::Destination.label(), "destination account");
        assert_eq!(AccountSide::Subject.label(), "account");
    }
}
