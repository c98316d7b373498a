//! Transaction-related types for the coin ledger
//!
//! This module defines the immutable records appended to the transaction log
//! by every committed ledger operation.

use super::account::{AccountId, Coins};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Transaction identifier
///
/// Drawn from a monotonically increasing sequence. Identifiers handed out to
/// aborted transactions are never reused.
pub type TransactionId = u64;

/// What a transaction record describes
///
/// Transfers name both parties; purchases only name the buyer because the
/// shop is a logical sink, not a tracked account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// Coins moved from one account to another (`from != to`)
    Transfer { from: AccountId, to: AccountId },

    /// Coins spent by `from` on merchandise
    Purchase { from: AccountId },
}

impl TransactionKind {
    /// The debited account
    pub fn from(&self) -> AccountId {
        match *self {
            TransactionKind::Transfer { from, .. } | TransactionKind::Purchase { from } => from,
        }
    }

    /// The credited account, if the kind has one
    pub fn to(&self) -> Option<AccountId> {
        match *self {
            TransactionKind::Transfer { to, .. } => Some(to),
            TransactionKind::Purchase { .. } => None,
        }
    }

    /// Whether `account` is the sender or the receiver
    pub fn involves(&self, account: AccountId) -> bool {
        self.from() == account || self.to() == Some(account)
    }
}

/// Completed ledger event
///
/// Appended exactly once per successful ledger operation and never mutated
/// or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    /// Assigned identifier
    pub id: TransactionId,

    /// Parties of the transaction
    #[serde(flatten)]
    pub kind: TransactionKind,

    /// Moved or spent amount (always positive)
    pub amount: Coins,

    /// Time the record was appended
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::transfer_sender(TransactionKind::Transfer { from: 1, to: 2 }, 1, true)]
    #[case::transfer_receiver(TransactionKind::Transfer { from: 1, to: 2 }, 2, true)]
    #[case::transfer_stranger(TransactionKind::Transfer { from: 1, to: 2 }, 3, false)]
    #[case::purchase_buyer(TransactionKind::Purchase { from: 1 }, 1, true)]
    #[case::purchase_stranger(TransactionKind::Purchase { from: 1 }, 2, false)]
    fn test_involves(
        #[case] kind: TransactionKind,
        #[case] account: AccountId,
        #[case] expected: bool,
    ) {
        assert_eq!(kind.involves(account), expected);
    }

    #[test]
    fn test_purchase_has_no_receiver() {
        let kind = TransactionKind::Purchase { from: 4 };
        assert_eq!(kind.from(), 4);
        assert_eq!(kind.to(), None);
    }

    #[test]
    fn test_record_serializes_kind_tag() {
        let record = TransactionRecord {
            id: 1,
            kind: TransactionKind::Transfer { from: 1, to: 2 },
            amount: 50,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "transfer");
        assert_eq!(value["from"], 1);
        assert_eq!(value["to"], 2);
        assert_eq!(value["amount"], 50);
    }
}
