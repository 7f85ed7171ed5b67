//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Big-endian keys so RocksDB iteration order equals id order

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(u64);

impl AccountId {
    /// Create new account ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Storage key (big-endian)
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a storage key
    pub fn from_key(key: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = key.try_into().ok()?;
        Some(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction record identifier, monotonically assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Create new transaction ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Storage key (big-endian)
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a storage key
    pub fn from_key(key: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = key.try_into().ok()?;
        Some(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account with its current balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID
    pub id: AccountId,

    /// Current balance, never negative after a commit
    pub balance: Decimal,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction ID
    pub id: TransactionId,

    /// Debited account
    pub from_account_id: AccountId,

    /// Credited account
    pub to_account_id: AccountId,

    /// Amount moved (always positive)
    pub amount: Decimal,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,

    /// Caller-supplied deduplication token
    #[serde(default)]
    pub idempotency_key: Option<String>,

    /// SHA-256 over the canonical record content
    pub checksum: [u8; 32],
}

impl TransactionRecord {
    /// Build a record and seal it with its checksum
    pub fn new(
        id: TransactionId,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Decimal,
        created_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        let mut record = Self {
            id,
            from_account_id,
            to_account_id,
            amount,
            created_at,
            idempotency_key,
            checksum: [0u8; 32],
        };
        record.checksum = crate::crypto::record_checksum(&record);
        record
    }

    /// Recompute the checksum and compare with the stored one
    pub fn verify_checksum(&self) -> bool {
        crate::crypto::record_checksum(self) == self.checksum
    }

    /// Whether this record describes the same movement as `request`
    pub fn matches(&self, request: &TransferRequest) -> bool {
        self.from_account_id == request.from
            && self.to_account_id == request.to
            && self.amount == request.amount
    }
}

/// Transfer request as accepted by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Account to debit
    pub from: AccountId,

    /// Account to credit
    pub to: AccountId,

    /// Amount to move
    pub amount: Decimal,

    /// Optional deduplication token for client retries
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Create a request without an idempotency key
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Self {
        Self {
            from,
            to,
            amount,
            idempotency_key: None,
        }
    }

    /// Attach an idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Both accounts in lock order (ascending id, deduplicated)
    pub fn lock_order(&self) -> Vec<AccountId> {
        if self.from == self.to {
            vec![self.from]
        } else if self.from < self.to {
            vec![self.from, self.to]
        } else {
            vec![self.to, self.from]
        }
    }
}

/// Result of a full ledger audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Number of accounts
    pub account_count: usize,

    /// Number of transaction records
    pub transaction_count: usize,

    /// Sum of all balances
    pub total_balance: Decimal,

    /// Accounts with a negative balance (must be empty)
    pub negative_accounts: Vec<AccountId>,

    /// Records whose checksum does not match their content (must be empty)
    pub corrupt_records: Vec<TransactionId>,
}

impl AuditReport {
    /// True when no invariant violation was found
    pub fn is_clean(&self) -> bool {
        self.negative_accounts.is_empty() && self.corrupt_records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_roundtrip_preserves_order() {
        let low = AccountId::new(2).to_key();
        let high = AccountId::new(256).to_key();
        assert!(low < high);
        assert_eq!(AccountId::from_key(&high), Some(AccountId::new(256)));
        assert_eq!(AccountId::from_key(&[1, 2, 3]), None);
    }

    #[test]
    fn test_lock_order_is_ascending() {
        let request = TransferRequest::new(AccountId::new(9), AccountId::new(4), Decimal::ONE);
        assert_eq!(request.lock_order(), vec![AccountId::new(4), AccountId::new(9)]);

        let request = TransferRequest::new(AccountId::new(4), AccountId::new(9), Decimal::ONE);
        assert_eq!(request.lock_order(), vec![AccountId::new(4), AccountId::new(9)]);
    }

    #[test]
    fn test_self_transfer_locks_once() {
        let request = TransferRequest::new(AccountId::new(7), AccountId::new(7), Decimal::ONE);
        assert_eq!(request.lock_order(), vec![AccountId::new(7)]);
    }

    #[test]
    fn test_record_checksum_detects_tampering() {
        let mut record = TransactionRecord::new(
            TransactionId::new(1),
            AccountId::new(1),
            AccountId::new(2),
            Decimal::new(10050, 2),
            Utc::now(),
            None,
        );
        assert!(record.verify_checksum());

        record.amount = Decimal::new(99999, 2);
        assert!(!record.verify_checksum());
    }
}
