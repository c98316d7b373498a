//! Asynchronous front of the ledger
//!
//! - **AsyncLedger**: runs ledger operations on tokio's blocking pool, with a
//!   cancellation token that aborts the operation when its future is dropped
//! - **BatchProcessor**: processes batches of commands concurrently, grouped
//!   by connected account names
//!
//! # Thread Safety
//!
//! Both components share one `Arc<Ledger>` / `Arc<LedgerEngine>`. Correctness
//! comes from the storage row locks, not from any lock in this module:
//! operations on disjoint accounts proceed in parallel, operations on the
//! same account are serialized by the storage layer.

pub mod batch_processor;
pub mod ledger;

pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use ledger::AsyncLedger;
