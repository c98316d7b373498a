//! Static merchandise catalog

use crate::core::traits::Catalog;
use crate::types::{CatalogItem, Coins, ItemType, LedgerError};
use std::collections::HashMap;

/// Built-in merchandise and prices
const MERCH: [(&str, Coins); 10] = [
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

/// Fixed item-type to price mapping
///
/// Built once at startup and never changed, so it can be shared across
/// threads without locking.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    prices: HashMap<ItemType, Coins>,
}

impl StaticCatalog {
    /// Build a catalog from items
    ///
    /// # Errors
    ///
    /// * `InvalidPrice` - an item has a price of zero or less
    /// * `Config` - an item type appears twice
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Result<Self, LedgerError> {
        let mut prices = HashMap::new();

        for item in items {
            if item.price <= 0 {
                return Err(LedgerError::InvalidPrice {
                    item: item.item_type,
                    price: item.price,
                });
            }
            if prices.contains_key(&item.item_type) {
                return Err(LedgerError::config(format!(
                    "Duplicate catalog item '{}'",
                    item.item_type
                )));
            }
            prices.insert(item.item_type, item.price);
        }

        Ok(StaticCatalog { prices })
    }

    /// The built-in merchandise catalog
    pub fn merch() -> Self {
        StaticCatalog {
            prices: MERCH
                .iter()
                .map(|(item, price)| (item.to_string(), *price))
                .collect(),
        }
    }

    /// Items sorted by type
    pub fn items(&self) -> Vec<CatalogItem> {
        let mut items: Vec<CatalogItem> = self
            .prices
            .iter()
            .map(|(item, price)| CatalogItem::new(item.clone(), *price))
            .collect();
        items.sort_by(|a, b| a.item_type.cmp(&b.item_type));
        items
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn price(&self, item: &str) -> Result<Coins, LedgerError> {
        self.prices
            .get(item)
            .copied()
            .ok_or_else(|| LedgerError::item_not_found(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::t_shirt("t-shirt", 80)]
    #[case::cup("cup", 20)]
    #[case::pink_hoody("pink-hoody", 500)]
    fn test_merch_prices(#[case] item: &str, #[case] price: Coins) {
        assert_eq!(StaticCatalog::merch().price(item), Ok(price));
    }

    #[test]
    fn test_unknown_item() {
        let catalog = StaticCatalog::merch();
        assert_eq!(catalog.price("hat"), Err(LedgerError::item_not_found("hat")));
        assert_eq!(catalog.len(), 10);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-20)]
    fn test_new_rejects_non_positive_price(#[case] price: Coins) {
        let result = StaticCatalog::new(vec![CatalogItem::new("cup", price)]);
        assert!(matches!(result, Err(LedgerError::InvalidPrice { .. })));
    }

    #[test]
    fn test_new_rejects_duplicate_items() {
        let result = StaticCatalog::new(vec![
            CatalogItem::new("cup", 20),
            CatalogItem::new("cup", 25),
        ]);
        assert!(matches!(result, Err(LedgerError::Config { .. })));
    }

    #[test]
    fn test_items_are_sorted() {
        let catalog = StaticCatalog::new(vec![
            CatalogItem::new("pen", 10),
            CatalogItem::new("book", 50),
        ])
        .unwrap();

        let items = catalog.items();
        assert_eq!(items[0].item_type, "book");
        assert_eq!(items[1].item_type, "pen");
    }
}
