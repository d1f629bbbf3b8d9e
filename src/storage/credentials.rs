// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `keys`: long-lived key → serialized [`KeyRecord`] (JSON bytes)
//!
//! ## Atomicity
//!
//! redb admits a single write transaction at a time. Every mutation below
//! re-reads the record inside its own write transaction and checks its
//! precondition there, so concurrent issuances for the same key behave as
//! compare-and-set: a caller whose view went stale gets [`CasOutcome::Stale`]
//! back together with the current record and never overwrites a newer state.

use std::path::Path;

use redb::{backends::InMemoryBackend, Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{KeyRecord, KeyStatus};

/// key id → serialized KeyRecord (JSON bytes).
const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key not found")]
    NotFound,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// Precondition held; the record now looks like this.
    Applied(KeyRecord),
    /// Precondition failed; nothing was written. Carries the current record.
    Stale(KeyRecord),
}

impl CasOutcome {
    pub fn record(&self) -> &KeyRecord {
        match self {
            CasOutcome::Applied(r) | CasOutcome::Stale(r) => r,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, CasOutcome::Applied(_))
    }
}

// =============================================================================
// CredentialStore
// =============================================================================

/// Durable store of long-lived key records.
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Database::create(path)?)
    }

    /// Non-persistent store, used by tests and local experiments.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Database::builder().create_with_backend(InMemoryBackend::new())?)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KEYS)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Cheap readiness probe: opens a read transaction on the keys table.
    pub fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(KEYS)?;
        Ok(())
    }

    /// Look up a record by key id.
    pub fn get(&self, id: &str) -> StoreResult<Option<KeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Create an unbound, active record unless one already exists.
    ///
    /// Returns `true` when a record was created.
    pub fn provision(&self, id: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let created = {
            let mut table = write_txn.open_table(KEYS)?;
            let exists = table.get(id)?.is_some();
            if !exists {
                let json = serde_json::to_vec(&KeyRecord::provisioned(id))?;
                table.insert(id, json.as_slice())?;
            }
            !exists
        };
        write_txn.commit()?;
        Ok(created)
    }

    /// Bind an unbound record to `province` with `city` as its only city.
    ///
    /// Stale if the record is banned or already bound.
    pub fn set_location(&self, id: &str, province: &str, city: &str) -> StoreResult<CasOutcome> {
        self.modify(id, |record| {
            if record.is_banned() || record.bound_province.is_some() {
                return false;
            }
            record.bound_province = Some(province.to_string());
            record.bound_cities = vec![city.to_string()];
            true
        })
    }

    /// Add `city` to a record bound to `province`.
    ///
    /// Applied without a write if the city is already bound. Stale if the
    /// record is banned, bound elsewhere, or already holds the maximum number
    /// of cities.
    pub fn append_city(&self, id: &str, province: &str, city: &str) -> StoreResult<CasOutcome> {
        self.modify(id, |record| {
            if record.is_banned() || record.bound_province.as_deref() != Some(province) {
                return false;
            }
            if record.knows_city(city) {
                return true;
            }
            if !record.has_room_for_city() {
                return false;
            }
            record.bound_cities.push(city.to_string());
            true
        })
    }

    /// Mark a record banned. Idempotent.
    pub fn ban(&self, id: &str) -> StoreResult<KeyRecord> {
        let outcome = self.modify(id, |record| {
            record.status = KeyStatus::Banned;
            true
        })?;
        Ok(outcome.record().clone())
    }

    /// Read-check-write a single record inside one write transaction.
    ///
    /// `apply` mutates the record in place and returns whether its
    /// precondition held. Nothing is written when it returns `false` or when
    /// the record is unchanged.
    fn modify<F>(&self, id: &str, apply: F) -> StoreResult<CasOutcome>
    where
        F: FnOnce(&mut KeyRecord) -> bool,
    {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(KEYS)?;
            let current: KeyRecord = match table.get(id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StoreError::NotFound),
            };

            let mut next = current.clone();
            if apply(&mut next) {
                if next != current {
                    let json = serde_json::to_vec(&next)?;
                    table.insert(id, json.as_slice())?;
                }
                CasOutcome::Applied(next)
            } else {
                CasOutcome::Stale(current)
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }
}
