//! Ledger Engine
//!
//! Moves value between accounts atomically and keeps an immutable audit trail
//! of every committed transfer.
//!
//! # Architecture
//!
//! - **Storage**: RocksDB `TransactionDB`, one pessimistic transaction per unit of work
//! - **AccountStore**: balances, read and written under exclusive row locks
//! - **TransactionLog**: append-only records, staged in the same unit of work
//! - **TransferCoordinator**: the only component with business rules
//! - **LedgerEngine**: facade for outer layers, [`LedgerHandle`] for async callers
//!
//! # Invariants
//!
//! - Money conservation: Σ(balances) is unchanged by transfers
//! - Non-negative balances after every commit
//! - A transaction record exists iff its transfer committed
//! - Deadlock freedom: locks are taken in ascending account order

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod storage;
pub mod accounts;
pub mod journal;
pub mod coordinator;
pub mod ledger;
pub mod handle;
pub mod crypto;
pub mod error;
pub mod config;
pub mod metrics;

// Re-exports
pub use error::{Error, LockResource, Result};
pub use types::{
    Account, AccountId, AuditReport, TransactionId, TransactionRecord, TransferRequest,
};
pub use storage::{Storage, UnitOfWork};
pub use accounts::{AccountStore, LockedAccount};
pub use journal::TransactionLog;
pub use coordinator::TransferCoordinator;
pub use ledger::LedgerEngine;
pub use handle::LedgerHandle;
pub use config::Config;
