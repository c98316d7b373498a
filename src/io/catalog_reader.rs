//! Catalog loading from CSV
//!
//! A catalog file has the columns `item,price`, one row per item type.

use crate::core::catalog::StaticCatalog;
use crate::types::{CatalogItem, LedgerError};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::info;

/// Load a catalog file
///
/// # Errors
///
/// * `FileNotFound` - no file at `path`
/// * `ParseError` - a row is not `item,price` with an integer price
/// * `InvalidPrice` / `Config` - a price is not positive or an item repeats
pub fn read_catalog(path: &Path) -> Result<StaticCatalog, LedgerError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => LedgerError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => LedgerError::from(e),
    })?;

    let catalog = parse_catalog(file)?;
    info!(path = %path.display(), items = catalog.len(), "loaded catalog");
    Ok(catalog)
}

/// Parse catalog rows from any reader
pub fn parse_catalog<R: Read>(reader: R) -> Result<StaticCatalog, LedgerError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let items = reader
        .deserialize::<CatalogItem>()
        .collect::<Result<Vec<_>, _>>()?;

    StaticCatalog::new(items)
}
