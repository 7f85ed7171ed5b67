//! Ledger engine facade
//!
//! Ties together storage, the account store, the transaction log and the
//! transfer coordinator into the API consumed by outer layers.
//!
//! # Example
//!
//! ```no_run
//! use ledger_engine::{Config, LedgerEngine};
//! use rust_decimal::Decimal;
//!
//! fn main() -> ledger_engine::Result<()> {
//!     let engine = LedgerEngine::open(Config::default())?;
//!
//!     let a = engine.create_account(Decimal::from(500))?;
//!     let b = engine.create_account(Decimal::from(300))?;
//!     engine.transfer(a.id, b.id, Decimal::from(100))?;
//!
//!     assert_eq!(engine.get_account(a.id)?.balance, Decimal::from(400));
//!     Ok(())
//! }
//! ```

use crate::{
    accounts::AccountStore,
    coordinator::TransferCoordinator,
    journal::TransactionLog,
    metrics::Metrics,
    types::{Account, AccountId, AuditReport, TransactionId, TransactionRecord, TransferRequest},
    Config, Error, Result, Storage,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;

/// Main ledger interface
#[derive(Debug)]
pub struct LedgerEngine {
    accounts: AccountStore,
    log: TransactionLog,
    coordinator: TransferCoordinator,
    metrics: Metrics,
    config: Config,
}

impl LedgerEngine {
    /// Open storage at `config.data_dir` and build the engine over it
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        Self::with_storage(storage, config)
    }

    /// Build the engine over an already open store handle
    pub fn with_storage(storage: Arc<Storage>, config: Config) -> Result<Self> {
        let metrics =
            Metrics::new().map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let accounts = AccountStore::new(storage.clone());
        let log = TransactionLog::new(storage.clone());
        let coordinator = TransferCoordinator::new(storage, accounts.clone(), log.clone());

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            "Ledger engine ready"
        );

        Ok(Self {
            accounts,
            log,
            coordinator,
            metrics,
            config,
        })
    }

    /// Create an account with an initial balance
    pub fn create_account(&self, initial_balance: Decimal) -> Result<Account> {
        let account = self.accounts.create(initial_balance)?;
        self.metrics.record_account_created();
        Ok(account)
    }

    /// Get an account
    pub fn get_account(&self, id: AccountId) -> Result<Account> {
        self.accounts.get(id)
    }

    /// All accounts, ascending id
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.accounts.list()
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransactionRecord> {
        self.execute(&TransferRequest::new(from, to, amount))
    }

    /// Move `amount` from `from` to `to`, deduplicated by `idempotency_key`
    pub fn transfer_with_key(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        idempotency_key: impl Into<String>,
    ) -> Result<TransactionRecord> {
        self.execute(&TransferRequest::new(from, to, amount).with_idempotency_key(idempotency_key))
    }

    /// Execute a transfer request
    pub fn execute(&self, request: &TransferRequest) -> Result<TransactionRecord> {
        let started = Instant::now();
        let result = self.coordinator.transfer(request);
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(_) => self.metrics.record_transfer(elapsed),
            Err(e) => {
                self.metrics.record_rejection(e.kind(), elapsed);
                tracing::warn!(
                    from = %request.from,
                    to = %request.to,
                    amount = %request.amount,
                    error = %e,
                    "Transfer rejected"
                );
            }
        }

        result
    }

    /// Transaction history, newest first
    pub fn list_transaction_history(&self) -> Result<Vec<TransactionRecord>> {
        self.log.list()
    }

    /// Get a committed transaction
    pub fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        self.log.get(id)
    }

    /// Check balances and record checksums
    ///
    /// Reads committed state without locks; run it while transfers are
    /// quiescent for an exact total.
    pub fn audit(&self) -> Result<AuditReport> {
        let accounts = self.accounts.list()?;
        let records = self.log.list()?;

        let mut total_balance = Decimal::ZERO;
        let mut negative_accounts = Vec::new();
        for account in &accounts {
            total_balance = total_balance
                .checked_add(account.balance)
                .ok_or(Error::InvalidAmount(account.balance))?;
            if account.balance < Decimal::ZERO {
                negative_accounts.push(account.id);
            }
        }

        let corrupt_records: Vec<TransactionId> = records
            .iter()
            .filter(|record| !record.verify_checksum())
            .map(|record| record.id)
            .collect();

        let report = AuditReport {
            account_count: accounts.len(),
            transaction_count: records.len(),
            total_balance,
            negative_accounts,
            corrupt_records,
        };

        if report.is_clean() {
            tracing::info!(
                accounts = report.account_count,
                transactions = report.transaction_count,
                total_balance = %report.total_balance,
                "Audit passed"
            );
        } else {
            tracing::error!(
                negative = ?report.negative_accounts,
                corrupt = ?report.corrupt_records,
                "Audit found invariant violations"
            );
        }

        Ok(report)
    }

    /// Engine metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
