//! Account report types
//!
//! The report joins an account's balance, inventory and coin history. Field
//! names serialize in camelCase to match the response shape callers expect.

use super::account::Coins;
use super::catalog::ItemType;
use serde::Serialize;

/// Counterparty label used for purchases
pub const SHOP_LABEL: &str = "shop";

/// Counterparty label used when a display name cannot be resolved
pub const UNKNOWN_COUNTERPARTY: &str = "unknown";

/// Balance, inventory and history of one account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub coins: Coins,
    pub inventory: Vec<InventoryItem>,
    pub coin_history: CoinHistory,
}

/// Owned quantity of one item type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub quantity: u64,
}

/// Coin history split by direction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CoinHistory {
    pub received: Vec<ReceivedEntry>,
    pub sent: Vec<SentEntry>,
}

/// Coins received from another account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedEntry {
    pub from_user: String,
    pub amount: Coins,
}

/// Coins sent to another account or spent in the shop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEntry {
    pub to_user: String,
    pub amount: Coins,
}

/// Report tagged with the account name, one line of the reports output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedReport {
    pub user: String,
    #[serde(flatten)]
    pub report: AccountReport,
}
