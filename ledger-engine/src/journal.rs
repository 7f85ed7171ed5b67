//! Transaction log: append-only record of committed transfers
//!
//! Records are keyed by transaction id (big-endian), so reverse iteration
//! yields newest first. Appends only stage writes inside the caller's unit of
//! work; a record becomes visible exactly when that unit of work commits.

use crate::{
    error::{Error, LockResource, Result},
    storage::{Storage, UnitOfWork, CF_IDEMPOTENCY, CF_TRANSACTIONS},
    types::{TransactionId, TransactionRecord},
};
use std::sync::Arc;

/// Transaction log
#[derive(Debug, Clone)]
pub struct TransactionLog {
    storage: Arc<Storage>,
}

impl TransactionLog {
    /// Create a log over an open storage handle
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Stage a record (and its idempotency index entry) in `uow`
    pub fn append(&self, uow: &UnitOfWork<'_>, record: &TransactionRecord) -> Result<()> {
        let key = record.id.to_key();

        if uow.get(CF_TRANSACTIONS, &key)?.is_some() {
            return Err(Error::PersistenceFailure(format!(
                "Transaction {} already recorded",
                record.id
            )));
        }

        uow.put(CF_TRANSACTIONS, &key, &bincode::serialize(record)?)?;

        if let Some(idempotency_key) = &record.idempotency_key {
            uow.put(CF_IDEMPOTENCY, idempotency_key.as_bytes(), &key)?;
        }

        tracing::debug!(
            scope_id = uow.scope_id(),
            transaction_id = %record.id,
            checksum = %hex::encode(record.checksum),
            "Transaction staged"
        );

        Ok(())
    }

    /// Committed record by id
    pub fn get(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        match self.storage.get(CF_TRANSACTIONS, &id.to_key())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All committed records, newest first
    pub fn list(&self) -> Result<Vec<TransactionRecord>> {
        self.storage.scan(CF_TRANSACTIONS, true)
    }

    /// Lock an idempotency key for the rest of `uow` and return the record
    /// previously committed under it, if any
    pub fn find_by_idempotency_key(
        &self,
        uow: &UnitOfWork<'_>,
        idempotency_key: &str,
    ) -> Result<Option<TransactionRecord>> {
        let value = uow.get_for_update(CF_IDEMPOTENCY, idempotency_key.as_bytes(), || {
            LockResource::IdempotencyKey(idempotency_key.to_string())
        })?;

        let Some(id_bytes) = value else {
            return Ok(None);
        };

        let id = TransactionId::from_key(&id_bytes).ok_or_else(|| {
            Error::PersistenceFailure(format!("Malformed index entry for {}", idempotency_key))
        })?;

        let record = uow.get(CF_TRANSACTIONS, &id.to_key())?.ok_or_else(|| {
            Error::PersistenceFailure(format!("Dangling index entry for {}", idempotency_key))
        })?;

        Ok(Some(bincode::deserialize(&record)?))
    }
}
