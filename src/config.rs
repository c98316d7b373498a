//! Configuration for the coin ledger

use crate::types::{Coins, LedgerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ledger configuration
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance given to newly registered accounts
    pub starting_balance: Coins,

    /// Maximum wait for a single row lock (milliseconds)
    pub lock_timeout_ms: u64,

    /// Maximum wait for the shared row lock of a report read (milliseconds)
    pub read_timeout_ms: u64,

    /// Deadline for one ledger operation (milliseconds, 0 disables it)
    pub transaction_timeout_ms: u64,

    /// Fetch inventory and history concurrently when building reports
    pub parallel_report_fetch: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            lock_timeout_ms: 250,
            read_timeout_ms: 5_000,
            transaction_timeout_ms: 5_000,
            parallel_report_fetch: false,
        }
    }
}

impl LedgerConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => e.into(),
        })?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| LedgerError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> Result<Self, LedgerError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    ///
    /// Recognised keys: `COIN_LEDGER_STARTING_BALANCE`,
    /// `COIN_LEDGER_LOCK_TIMEOUT_MS`, `COIN_LEDGER_READ_TIMEOUT_MS`,
    /// `COIN_LEDGER_TRANSACTION_TIMEOUT_MS`, `COIN_LEDGER_PARALLEL_REPORTS`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("COIN_LEDGER_STARTING_BALANCE") {
            self.starting_balance = parse_var("COIN_LEDGER_STARTING_BALANCE", &value)?;
        }

        if let Some(value) = lookup("COIN_LEDGER_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = parse_var("COIN_LEDGER_LOCK_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("COIN_LEDGER_READ_TIMEOUT_MS") {
            self.read_timeout_ms = parse_var("COIN_LEDGER_READ_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("COIN_LEDGER_TRANSACTION_TIMEOUT_MS") {
            self.transaction_timeout_ms = parse_var("COIN_LEDGER_TRANSACTION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("COIN_LEDGER_PARALLEL_REPORTS") {
            self.parallel_report_fetch = parse_var("COIN_LEDGER_PARALLEL_REPORTS", &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject configurations the ledger cannot run with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.starting_balance < 0 {
            return Err(LedgerError::config(format!(
                "starting_balance must be >= 0, got {}",
                self.starting_balance
            )));
        }
        if self.lock_timeout_ms == 0 {
            return Err(LedgerError::config("lock_timeout_ms must be > 0"));
        }
        if self.read_timeout_ms == 0 {
            return Err(LedgerError::config("read_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Operation deadline, `None` when disabled
    pub fn transaction_timeout(&self) -> Option<Duration> {
        (self.transaction_timeout_ms > 0).then(|| Duration::from_millis(self.transaction_timeout_ms))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LedgerError> {
    value
        .trim()
        .parse()
        .map_err(|_| LedgerError::config(format!("Invalid value '{}' for {}", value, key)))
}
