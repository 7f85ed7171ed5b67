//! Account store: durable id -> balance mapping with pessimistic locking

use crate::{
    error::{Error, LockResource, Result},
    storage::{Storage, UnitOfWork, CF_ACCOUNTS},
    types::{Account, AccountId},
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Account read under an exclusive lock
///
/// Only [`AccountStore::lock_and_get`] can produce one, and it is bound to the
/// unit of work that took the lock. Balance writes require it.
#[derive(Debug)]
pub struct LockedAccount {
    account: Account,
    scope_id: u64,
}

impl LockedAccount {
    /// Account ID
    pub fn id(&self) -> AccountId {
        self.account.id
    }

    /// Balance as seen by the owning unit of work
    pub fn balance(&self) -> Decimal {
        self.account.balance
    }

    /// Snapshot of the locked account
    pub fn account(&self) -> &Account {
        &self.account
    }
}

/// Account store
#[derive(Debug, Clone)]
pub struct AccountStore {
    storage: Arc<Storage>,
}

impl AccountStore {
    /// Create a store over an open storage handle
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Get committed account state
    pub fn get(&self, id: AccountId) -> Result<Account> {
        let value = self
            .storage
            .get(CF_ACCOUNTS, &id.to_key())?
            .ok_or(Error::AccountNotFound(id))?;

        Ok(bincode::deserialize(&value)?)
    }

    /// All accounts, ascending id
    pub fn list(&self) -> Result<Vec<Account>> {
        self.storage.scan(CF_ACCOUNTS, false)
    }

    /// Create an account with a fresh id
    pub fn create(&self, initial_balance: Decimal) -> Result<Account> {
        if initial_balance < Decimal::ZERO {
            return Err(Error::InvalidAmount(initial_balance));
        }

        let account = Account {
            id: self.storage.next_account_id(),
            balance: initial_balance,
            created_at: Utc::now(),
        };

        let uow = self.storage.begin();
        uow.put(CF_ACCOUNTS, &account.id.to_key(), &bincode::serialize(&account)?)?;
        uow.commit()?;

        tracing::info!(
            account_id = %account.id,
            balance = %account.balance,
            "Account created"
        );

        Ok(account)
    }

    /// Lock an account for the rest of `uow` and read it
    pub fn lock_and_get(&self, uow: &UnitOfWork<'_>, id: AccountId) -> Result<LockedAccount> {
        self.try_lock(uow, id)?.ok_or(Error::AccountNotFound(id))
    }

    /// Like [`lock_and_get`](Self::lock_and_get), but a missing account is `None`
    ///
    /// The lock on the key is taken either way.
    pub fn try_lock(&self, uow: &UnitOfWork<'_>, id: AccountId) -> Result<Option<LockedAccount>> {
        let value = uow.get_for_update(CF_ACCOUNTS, &id.to_key(), || LockResource::Account(id))?;

        tracing::debug!(scope_id = uow.scope_id(), account_id = %id, "Account locked");

        match value {
            Some(bytes) => Ok(Some(LockedAccount {
                account: bincode::deserialize(&bytes)?,
                scope_id: uow.scope_id(),
            })),
            None => Ok(None),
        }
    }

    /// Stage a new balance for a locked account
    pub fn update(
        &self,
        uow: &UnitOfWork<'_>,
        locked: &mut LockedAccount,
        new_balance: Decimal,
    ) -> Result<()> {
        if locked.scope_id != uow.scope_id() {
            return Err(Error::LockNotHeld(locked.id()));
        }
        if new_balance < Decimal::ZERO {
            return Err(Error::InvalidAmount(new_balance));
        }

        locked.account.balance = new_balance;
        uow.put(
            CF_ACCOUNTS,
            &locked.id().to_key(),
            &bincode::serialize(&locked.account)?,
        )
    }
}
