//! Async handle for tokio callers
//!
//! Lock waits inside a transfer block the calling thread, so request handlers
//! running on the async runtime go through [`LedgerHandle`], which moves each
//! engine call onto the blocking thread pool.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │   request handlers (async)   │
//! └──────────────┬───────────────┘
//!                │ LedgerHandle (Clone)
//!                ▼
//! ┌──────────────────────────────┐
//! │   spawn_blocking worker      │  one per call, blocks on row locks
//! └──────────────┬───────────────┘
//!                ▼
//! ┌──────────────────────────────┐
//! │   LedgerEngine (Arc, Sync)   │
//! └──────────────────────────────┘
//! ```

use crate::{
    types::{Account, AccountId, AuditReport, TransactionRecord, TransferRequest},
    Error, LedgerEngine, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Cloneable async facade over a shared [`LedgerEngine`]
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    engine: Arc<LedgerEngine>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// Underlying engine
    pub fn engine(&self) -> &Arc<LedgerEngine> {
        &self.engine
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LedgerEngine) -> Result<T> + Send + 'static,
    {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || op(&engine))
            .await
            .map_err(|e| Error::Concurrency(format!("Ledger task failed: {}", e)))?
    }

    /// Create an account
    pub async fn create_account(&self, initial_balance: Decimal) -> Result<Account> {
        self.run(move |engine| engine.create_account(initial_balance)).await
    }

    /// Get an account
    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        self.run(move |engine| engine.get_account(id)).await
    }

    /// All accounts
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.run(|engine| engine.list_accounts()).await
    }

    /// Transfer funds
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransactionRecord> {
        self.run(move |engine| engine.transfer(from, to, amount)).await
    }

    /// Execute a transfer request
    pub async fn execute(&self, request: TransferRequest) -> Result<TransactionRecord> {
        self.run(move |engine| engine.execute(&request)).await
    }

    /// Transaction history, newest first
    pub async fn list_transaction_history(&self) -> Result<Vec<TransactionRecord>> {
        self.run(|engine| engine.list_transaction_history()).await
    }

    /// Audit the ledger
    pub async fn audit(&self) -> Result<AuditReport> {
        self.run(|engine| engine.audit()).await
    }
}
