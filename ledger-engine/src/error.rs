//! Error types for the transfer engine

use crate::types::AccountId;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every variant returned from a transfer means the unit of work was aborted:
/// no balance changed and no record was appended.
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Source balance is lower than the requested amount
    #[error("Insufficient funds in account {account}: have {have}, need {need}")]
    InsufficientFunds {
        /// Source account
        account: AccountId,
        /// Balance at the time of the check
        have: Decimal,
        /// Requested amount
        need: Decimal,
    },

    /// Non-positive transfer amount, negative balance or arithmetic overflow
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Underlying storage could not complete the operation
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Lock could not be acquired within the configured wait
    #[error("Timed out waiting for lock on {0}")]
    LockTimeout(LockResource),

    /// Balance write attempted without holding the account lock
    #[error("Lock not held for account {0}")]
    LockNotHeld(AccountId),

    /// Idempotency key reused for a different transfer
    #[error("Idempotency key {0} already used for a different transfer")]
    IdempotencyConflict(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (blocking task panicked or was cancelled)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key a unit of work was waiting to lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockResource {
    /// Account row
    Account(AccountId),
    /// Idempotency index entry
    IdempotencyKey(String),
}

impl fmt::Display for LockResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockResource::Account(id) => write!(f, "account {}", id),
            LockResource::IdempotencyKey(key) => write!(f, "idempotency key {}", key),
        }
    }
}

impl Error {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout(_))
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::AccountNotFound(_) => "account_not_found",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::PersistenceFailure(_) => "persistence_failure",
            Error::LockTimeout(_) => "lock_timeout",
            Error::LockNotHeld(_) => "lock_not_held",
            Error::IdempotencyConflict(_) => "idempotency_conflict",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::PersistenceFailure(err.to_string())
    }
}
