//! Transfer coordinator: the read-check-mutate-record sequence
//!
//! # Unit of work
//!
//! ```text
//! validate amount            (no storage access)
//!   │
//!   ▼
//! begin ─► lock idempotency key (if any) ─► replay / conflict
//!   │
//!   ▼
//! lock accounts, ascending id
//!   │
//!   ▼
//! check source, funds, destination
//!   │
//!   ▼
//! debit ─► credit ─► append record ─► commit
//! ```
//!
//! Any `?` between `begin` and `commit` drops the unit of work, which rolls
//! back every staged write and releases every lock.
//!
//! # Invariants
//!
//! - Money conservation: Σ(balances) unchanged by every committed transfer
//! - A record exists iff its transfer committed
//! - Locks are always taken in the same global order, so no two transfers
//!   can wait on each other

use crate::{
    accounts::{AccountStore, LockedAccount},
    error::{Error, Result},
    journal::TransactionLog,
    storage::Storage,
    types::{TransactionRecord, TransferRequest},
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Executes transfers as atomic units of work
#[derive(Debug, Clone)]
pub struct TransferCoordinator {
    storage: Arc<Storage>,
    accounts: AccountStore,
    log: TransactionLog,
}

impl TransferCoordinator {
    /// Create a coordinator over the shared store
    pub fn new(storage: Arc<Storage>, accounts: AccountStore, log: TransactionLog) -> Self {
        Self {
            storage,
            accounts,
            log,
        }
    }

    /// Move `request.amount` from `request.from` to `request.to`
    ///
    /// Returns the committed record, or the previously committed record when
    /// the idempotency key was already used for the same movement.
    pub fn transfer(&self, request: &TransferRequest) -> Result<TransactionRecord> {
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(request.amount));
        }

        let uow = self.storage.begin();

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = self.log.find_by_idempotency_key(&uow, key)? {
                if !existing.matches(request) {
                    return Err(Error::IdempotencyConflict(key.clone()));
                }

                tracing::info!(
                    transaction_id = %existing.id,
                    idempotency_key = %key,
                    "Replayed transfer"
                );
                return Ok(existing);
            }
        }

        let mut source: Option<LockedAccount> = None;
        let mut destination: Option<LockedAccount> = None;
        for id in request.lock_order() {
            let locked = self.accounts.try_lock(&uow, id)?;
            if id == request.from {
                source = locked;
            } else {
                destination = locked;
            }
        }

        let mut source = source.ok_or(Error::AccountNotFound(request.from))?;

        if source.balance() < request.amount {
            return Err(Error::InsufficientFunds {
                account: request.from,
                have: source.balance(),
                need: request.amount,
            });
        }

        // Self-transfer: debit and credit cancel, only the record is written
        if request.from != request.to {
            let mut destination = destination.ok_or(Error::AccountNotFound(request.to))?;

            let debited = source.balance() - request.amount;
            let credited = destination
                .balance()
                .checked_add(request.amount)
                .ok_or(Error::InvalidAmount(request.amount))?;

            self.accounts.update(&uow, &mut source, debited)?;
            self.accounts.update(&uow, &mut destination, credited)?;
        }

        let (id, created_at) = self.storage.next_transaction();
        let record = TransactionRecord::new(
            id,
            request.from,
            request.to,
            request.amount,
            created_at,
            request.idempotency_key.clone(),
        );
        self.log.append(&uow, &record)?;

        uow.commit()?;

        tracing::info!(
            transaction_id = %record.id,
            from = %record.from_account_id,
            to = %record.to_account_id,
            amount = %record.amount,
            "Transfer committed"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, AccountId};
    use crate::Config;
    use tempfile::TempDir;

    struct Fixture {
        coordinator: TransferCoordinator,
        accounts: AccountStore,
        log: TransactionLog,
        storage: Arc<Storage>,
        _temp: TempDir,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.locking.lock_timeout_ms = 100;

        let storage = Arc::new(Storage::open(&config).unwrap());
        let accounts = AccountStore::new(storage.clone());
        let log = TransactionLog::new(storage.clone());
        let coordinator = TransferCoordinator::new(storage.clone(), accounts.clone(), log.clone());

        Fixture {
            coordinator,
            accounts,
            log,
            storage,
            _temp: temp_dir,
        }
    }

    fn balance(f: &Fixture, account: &Account) -> Decimal {
        f.accounts.get(account.id).unwrap().balance
    }

    #[test]
    fn test_transfer_moves_funds_and_records() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let b = f.accounts.create(Decimal::from(300)).unwrap();

        let record = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, b.id, Decimal::from(100)))
            .unwrap();

        assert_eq!(balance(&f, &a), Decimal::from(400));
        assert_eq!(balance(&f, &b), Decimal::from(400));
        assert_eq!(record.amount, Decimal::from(100));
        assert_eq!(f.log.list().unwrap(), vec![record]);
    }

    #[test]
    fn test_zero_and_negative_amounts_rejected() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let b = f.accounts.create(Decimal::from(300)).unwrap();

        for amount in [Decimal::ZERO, Decimal::from(-5)] {
            let result = f.coordinator.transfer(&TransferRequest::new(a.id, b.id, amount));
            assert!(matches!(result, Err(Error::InvalidAmount(x)) if x == amount));
        }
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_insufficient_funds_has_no_effect() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let c = f.accounts.create(Decimal::from(50)).unwrap();

        let result = f
            .coordinator
            .transfer(&TransferRequest::new(c.id, a.id, Decimal::from(100)));

        match result {
            Err(Error::InsufficientFunds { account, have, need }) => {
                assert_eq!(account, c.id);
                assert_eq!(have, Decimal::from(50));
                assert_eq!(need, Decimal::from(100));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }
        assert_eq!(balance(&f, &a), Decimal::from(500));
        assert_eq!(balance(&f, &c), Decimal::from(50));
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_source_reported_first() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();

        // Missing source with a higher id than the destination
        let result = f
            .coordinator
            .transfer(&TransferRequest::new(AccountId::new(999), a.id, Decimal::from(10)));
        assert!(matches!(result, Err(Error::AccountNotFound(id)) if id == AccountId::new(999)));

        // Both missing: source wins
        let result = f.coordinator.transfer(&TransferRequest::new(
            AccountId::new(998),
            AccountId::new(997),
            Decimal::from(10),
        ));
        assert!(matches!(result, Err(Error::AccountNotFound(id)) if id == AccountId::new(998)));
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_destination_has_no_effect() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();

        let result = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, AccountId::new(42), Decimal::from(10)));
        assert!(matches!(result, Err(Error::AccountNotFound(id)) if id == AccountId::new(42)));
        assert_eq!(balance(&f, &a), Decimal::from(500));
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_self_transfer_records_without_moving() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();

        let record = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, a.id, Decimal::from(200)))
            .unwrap();

        assert_eq!(record.from_account_id, record.to_account_id);
        assert_eq!(balance(&f, &a), Decimal::from(500));
        assert_eq!(f.log.list().unwrap().len(), 1);
    }

    #[test]
    fn test_self_transfer_requires_funds() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(5)).unwrap();

        let result = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, a.id, Decimal::from(10)));
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_idempotent_replay_returns_same_record() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let b = f.accounts.create(Decimal::from(0)).unwrap();

        let request =
            TransferRequest::new(a.id, b.id, Decimal::from(100)).with_idempotency_key("req-1");
        let first = f.coordinator.transfer(&request).unwrap();
        let second = f.coordinator.transfer(&request).unwrap();

        assert_eq!(first, second);
        assert_eq!(balance(&f, &a), Decimal::from(400));
        assert_eq!(balance(&f, &b), Decimal::from(100));
        assert_eq!(f.log.list().unwrap().len(), 1);
    }

    #[test]
    fn test_idempotency_key_conflict() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let b = f.accounts.create(Decimal::from(0)).unwrap();

        f.coordinator
            .transfer(
                &TransferRequest::new(a.id, b.id, Decimal::from(100)).with_idempotency_key("req-1"),
            )
            .unwrap();

        let result = f.coordinator.transfer(
            &TransferRequest::new(a.id, b.id, Decimal::from(150)).with_idempotency_key("req-1"),
        );
        assert!(matches!(result, Err(Error::IdempotencyConflict(ref k)) if k == "req-1"));
        assert_eq!(balance(&f, &a), Decimal::from(400));
    }

    #[test]
    fn test_failed_transfer_does_not_consume_idempotency_key() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(50)).unwrap();
        let b = f.accounts.create(Decimal::from(0)).unwrap();

        let request =
            TransferRequest::new(a.id, b.id, Decimal::from(100)).with_idempotency_key("req-2");
        assert!(f.coordinator.transfer(&request).is_err());

        let retry =
            TransferRequest::new(a.id, b.id, Decimal::from(50)).with_idempotency_key("req-2");
        assert!(f.coordinator.transfer(&retry).is_ok());
        assert_eq!(balance(&f, &a), Decimal::ZERO);
    }

    #[test]
    fn test_locked_destination_times_out_without_effect() {
        let f = fixture();
        let a = f.accounts.create(Decimal::from(500)).unwrap();
        let b = f.accounts.create(Decimal::from(0)).unwrap();

        let holder = f.storage.begin();
        let _locked = f.accounts.lock_and_get(&holder, b.id).unwrap();

        let result = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, b.id, Decimal::from(100)));
        assert!(matches!(result, Err(ref e) if e.is_retryable()));
        assert!(matches!(
            result,
            Err(Error::LockTimeout(crate::LockResource::Account(id))) if id == b.id
        ));

        drop(holder);
        assert_eq!(balance(&f, &a), Decimal::from(500));
        assert!(f.log.list().unwrap().is_empty());
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let f = fixture();
        let a = f.accounts.create(Decimal::MAX).unwrap();
        let b = f.accounts.create(Decimal::MAX).unwrap();

        let result = f
            .coordinator
            .transfer(&TransferRequest::new(a.id, b.id, Decimal::ONE));
        assert!(matches!(result, Err(Error::InvalidAmount(_))));
        assert_eq!(balance(&f, &a), Decimal::MAX);
    }
}
