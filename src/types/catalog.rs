//! Catalog and inventory types
//!
//! Merchandise is addressed by its item type string. The catalog maps item
//! types to prices; inventory entries count what each account owns.

use super::account::{AccountId, Coins};
use serde::{Deserialize, Serialize};

/// Merchandise item type (unique catalog key, e.g. `"t-shirt"`)
pub type ItemType = String;

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique item type
    #[serde(rename = "item")]
    pub item_type: ItemType,

    /// Price in coins (always positive)
    pub price: Coins,
}

impl CatalogItem {
    pub fn new(item_type: impl Into<ItemType>, price: Coins) -> Self {
        CatalogItem {
            item_type: item_type.into(),
            price,
        }
    }
}

/// Owned quantity of one item type for one account
///
/// Unique per (account, item type). Created at quantity 1 on the first
/// purchase and only incremented afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Owning account
    pub account: AccountId,

    /// Item type
    pub item_type: ItemType,

    /// Owned quantity
    pub quantity: u64,
}
