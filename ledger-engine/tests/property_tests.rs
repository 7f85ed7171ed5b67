//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Money conservation: Σ(balances) unchanged by any transfer sequence
//! - No effect on failure: rejected transfers change nothing
//! - Exactly-once record: one record per committed transfer
//! - Non-negative balances after every operation

use ledger_engine::{Config, LedgerEngine};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating amounts, including zero and overdrafts
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0u64..50_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Strategy for initial balances
fn balances_strategy() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(
        (0u64..100_000u64).prop_map(|cents| Decimal::new(cents as i64, 2)),
        2..5,
    )
}

/// Transfers as (from index, to index, amount); indices may point past the
/// last account to exercise missing accounts
fn transfers_strategy() -> impl Strategy<Value = Vec<(usize, usize, Decimal)>> {
    prop::collection::vec((0usize..6, 0usize..6, amount_strategy()), 1..20)
}

/// Id guaranteed not to exist in a freshly created engine
fn missing_account(index: usize) -> ledger_engine::AccountId {
    ledger_engine::AccountId::new(10_000 + index as u64)
}

/// Create test engine with temp directory
fn create_test_engine() -> (LedgerEngine, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().to_path_buf();
    (LedgerEngine::open(config).unwrap(), temp_dir)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: total balance is conserved and failures have no effect
    #[test]
    fn prop_conservation_and_atomicity(
        initial in balances_strategy(),
        transfers in transfers_strategy(),
    ) {
        let (engine, _temp) = create_test_engine();

        let mut ids = Vec::new();
        for balance in &initial {
            ids.push(engine.create_account(*balance).unwrap().id);
        }
        let total_before: Decimal = initial.iter().copied().sum();

        let mut committed = 0usize;
        for (from, to, amount) in transfers {
            let from_id = ids.get(from).copied().unwrap_or(missing_account(from));
            let to_id = ids.get(to).copied().unwrap_or(missing_account(to));

            let before = engine.list_accounts().unwrap();
            let history_before = engine.list_transaction_history().unwrap().len();

            match engine.transfer(from_id, to_id, amount) {
                Ok(record) => {
                    committed += 1;
                    prop_assert_eq!(record.amount, amount);
                    let history = engine.list_transaction_history().unwrap();
                    prop_assert_eq!(history.len(), history_before + 1);
                }
                Err(_) => {
                    prop_assert_eq!(engine.list_accounts().unwrap(), before);
                    let history = engine.list_transaction_history().unwrap();
                    prop_assert_eq!(history.len(), history_before);
                }
            }

            for account in engine.list_accounts().unwrap() {
                prop_assert!(account.balance >= Decimal::ZERO);
            }
        }

        let report = engine.audit().unwrap();
        prop_assert!(report.is_clean());
        prop_assert_eq!(report.total_balance, total_before);
        prop_assert_eq!(report.transaction_count, committed);
    }

    /// Property: non-positive amounts are always rejected
    #[test]
    fn prop_non_positive_amounts_rejected(cents in -100_000i64..=0i64) {
        let (engine, _temp) = create_test_engine();
        let a = engine.create_account(Decimal::from(1_000)).unwrap();
        let b = engine.create_account(Decimal::from(1_000)).unwrap();

        let result = engine.transfer(a.id, b.id, Decimal::new(cents, 2));
        prop_assert!(matches!(result, Err(ledger_engine::Error::InvalidAmount(_))));
        prop_assert!(engine.list_transaction_history().unwrap().is_empty());
    }
}
