//! Storage layer using a RocksDB `TransactionDB`
//!
//! # Column Families
//!
//! - `accounts` - Account balances (key: account_id, big-endian)
//! - `transactions` - Append-only transfer log (key: transaction_id, big-endian)
//! - `idempotency` - Idempotency key -> transaction_id
//!
//! Every mutation goes through a [`UnitOfWork`], a pessimistic RocksDB
//! transaction. Keys read with [`UnitOfWork::get_for_update`] stay exclusively
//! locked until the unit of work is committed or dropped.

use crate::{
    error::{Error, LockResource, Result},
    types::{AccountId, TransactionId, TransactionRecord},
    Config,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, ErrorKind, IteratorMode, Options,
    SingleThreaded, Transaction, TransactionDB, TransactionDBOptions, TransactionOptions,
    WriteOptions,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column family names
pub(crate) const CF_ACCOUNTS: &str = "accounts";
pub(crate) const CF_TRANSACTIONS: &str = "transactions";
pub(crate) const CF_IDEMPOTENCY: &str = "idempotency";

type Db = TransactionDB<SingleThreaded>;

/// Hands out transaction ids and commit timestamps together so that id order
/// and timestamp order never disagree.
struct Sequencer {
    next_transaction_id: u64,
    last_created_at: DateTime<Utc>,
}

/// Transactional store handle shared by the account store and the log
pub struct Storage {
    db: Db,
    path: PathBuf,
    lock_timeout_ms: i64,
    deadlock_detect: bool,
    next_account_id: AtomicU64,
    next_scope_id: AtomicU64,
    sequencer: Mutex<Sequencer>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.path)
            .field("lock_timeout_ms", &self.lock_timeout_ms)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let lock_timeout_ms = config.lock_timeout_millis();

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(lock_timeout_ms);
        txn_db_opts.set_default_lock_timeout(lock_timeout_ms);
        txn_db_opts.set_max_num_locks(config.locking.max_num_locks);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_idempotency()),
        ];

        let db: Db =
            TransactionDB::open_cf_descriptors(&db_opts, &txn_db_opts, path, cf_descriptors)?;

        let mut storage = Self {
            db,
            path: path.clone(),
            lock_timeout_ms,
            deadlock_detect: config.locking.deadlock_detect,
            next_account_id: AtomicU64::new(1),
            next_scope_id: AtomicU64::new(1),
            sequencer: Mutex::new(Sequencer {
                next_transaction_id: 1,
                last_created_at: DateTime::<Utc>::MIN_UTC,
            }),
        };
        storage.restore_sequences()?;

        tracing::info!(
            path = ?path,
            lock_timeout_ms,
            next_account_id = storage.next_account_id.load(Ordering::Relaxed),
            "Opened ledger storage"
        );

        Ok(storage)
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Balances are point-read on every transfer
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_idempotency() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    // Helper: get column family handle

    pub(crate) fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::PersistenceFailure(format!("Column family {} not found", name)))
    }

    /// Resume id sequences from the highest persisted keys
    fn restore_sequences(&mut self) -> Result<()> {
        if let Some((key, _)) = self.last_entry(CF_ACCOUNTS)? {
            let last = AccountId::from_key(&key)
                .ok_or_else(|| Error::PersistenceFailure("Malformed account key".to_string()))?;
            *self.next_account_id.get_mut() = last.value() + 1;
        }

        if let Some((_, value)) = self.last_entry(CF_TRANSACTIONS)? {
            let last: TransactionRecord = bincode::deserialize(&value)?;
            let sequencer = self.sequencer.get_mut();
            sequencer.next_transaction_id = last.id.value() + 1;
            sequencer.last_created_at = last.created_at;
        }

        Ok(())
    }

    fn last_entry(&self, cf_name: &str) -> Result<Option<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => Ok(Some(item?)),
            None => Ok(None),
        }
    }

    // Sequences

    /// Allocate a fresh account id
    pub(crate) fn next_account_id(&self) -> AccountId {
        AccountId::new(self.next_account_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Allocate a transaction id together with its commit timestamp
    pub(crate) fn next_transaction(&self) -> (TransactionId, DateTime<Utc>) {
        let mut sequencer = self.sequencer.lock();

        let id = TransactionId::new(sequencer.next_transaction_id);
        sequencer.next_transaction_id += 1;

        let created_at = Utc::now().max(sequencer.last_created_at);
        sequencer.last_created_at = created_at;

        (id, created_at)
    }

    // Committed reads (no locks)

    /// Point read of committed data
    pub(crate) fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    /// Decode every value of a column family, in key order or reversed
    pub(crate) fn scan<T>(&self, cf_name: &str, newest_first: bool) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let cf = self.cf_handle(cf_name)?;
        let mode = if newest_first {
            IteratorMode::End
        } else {
            IteratorMode::Start
        };

        let mut items = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (_, value) = item?;
            items.push(bincode::deserialize(&value)?);
        }

        Ok(items)
    }

    // Units of work

    /// Open a new atomic scope
    pub fn begin(&self) -> UnitOfWork<'_> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(self.lock_timeout_ms);
        txn_opts.set_deadlock_detect(self.deadlock_detect);

        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
        let scope_id = self.next_scope_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(scope_id, "Unit of work opened");

        UnitOfWork {
            storage: self,
            txn: Some(txn),
            scope_id,
        }
    }
}

/// Atomic scope over the store
///
/// Writes stay invisible to other scopes until [`UnitOfWork::commit`].
/// Dropping an uncommitted unit of work rolls it back and releases its locks,
/// on early returns and panics alike.
pub struct UnitOfWork<'a> {
    storage: &'a Storage,
    txn: Option<Transaction<'a, Db>>,
    scope_id: u64,
}

impl fmt::Debug for UnitOfWork<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("scope_id", &self.scope_id)
            .field("active", &self.txn.is_some())
            .finish()
    }
}

impl<'a> UnitOfWork<'a> {
    /// Identifier of this scope, unique per process
    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    fn txn(&self) -> Result<&Transaction<'a, Db>> {
        self.txn
            .as_ref()
            .ok_or_else(|| Error::PersistenceFailure("Unit of work already finished".to_string()))
    }

    /// Read a key and take an exclusive lock on it for the rest of the scope
    ///
    /// Lock waits longer than the configured timeout are reported as
    /// [`Error::LockTimeout`] naming `resource`.
    pub(crate) fn get_for_update(
        &self,
        cf_name: &str,
        key: &[u8],
        resource: impl FnOnce() -> LockResource,
    ) -> Result<Option<Vec<u8>>> {
        let cf = self.storage.cf_handle(cf_name)?;
        match self.txn()?.get_for_update_cf(cf, key, true) {
            Ok(value) => Ok(value),
            Err(err) if is_lock_contention(&err) => {
                let resource = resource();
                tracing::warn!(scope_id = self.scope_id, %resource, "Lock wait timed out");
                Err(Error::LockTimeout(resource))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read a key as seen by this scope (own writes included)
    pub(crate) fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.storage.cf_handle(cf_name)?;
        Ok(self.txn()?.get_cf(cf, key)?)
    }

    /// Stage a write
    pub(crate) fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.storage.cf_handle(cf_name)?;
        self.txn()?.put_cf(cf, key, value)?;
        Ok(())
    }

    /// Make all staged writes visible atomically
    pub fn commit(mut self) -> Result<()> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| Error::PersistenceFailure("Unit of work already finished".to_string()))?;

        txn.commit()?;
        tracing::trace!(scope_id = self.scope_id, "Unit of work committed");
        Ok(())
    }

    /// Discard all staged writes and release locks
    pub fn abort(mut self) -> Result<()> {
        self.rollback()
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback()?;
            tracing::trace!(scope_id = self.scope_id, "Unit of work rolled back");
        }
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            tracing::error!(scope_id = self.scope_id, error = %e, "Rollback failed");
        }
    }
}

/// RocksDB reports lock wait timeouts as `TimedOut` and detected deadlocks as `Busy`
fn is_lock_contention(err: &rocksdb::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::Busy)
}
