// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! # Persistent Key/Value Store
//!
//! Durable string key → string value storage surviving app restarts. The
//! [`KvStore`] trait is the contract; [`KvDatabase`] is the on-device
//! implementation backed by redb, and [`MemoryStore`] backs tests and
//! embedding scenarios with no durability requirement.
//!
//! ## Key Layout
//!
//! | Key | Semantics |
//! |-----|-----------|
//! | `sessionId` | Opaque server session token |
//! | `userData` | JSON-encoded [`UserRecord`](crate::models::UserRecord) |
//! | `lastActivity` | Epoch milliseconds, as a decimal string |
//! | `mwaAuthToken` | Cached wallet reauthorization token |
//! | `mwaBase64Address` | Wallet address the cached token belongs to |
//! | `policyAcceptedVersions` | JSON-encoded accepted policy set |
//!
//! ## Consistency
//!
//! Writes are last-writer-wins per key; callers must not assume multi-key
//! atomicity. Session-clearing code removes each key independently so a
//! failing key never blocks cleanup of the others.

pub mod kv;
pub mod memory;

pub use kv::KvDatabase;
pub use memory::MemoryStore;

/// Well-known store keys. Names are part of the on-device format and must
/// not change without a migration.
pub mod keys {
    /// Opaque server session token.
    pub const SESSION_ID: &str = "sessionId";
    /// JSON-encoded user record.
    pub const USER_DATA: &str = "userData";
    /// Epoch-milliseconds activity stamp.
    pub const LAST_ACTIVITY: &str = "lastActivity";
    /// Cached wallet reauthorization token.
    pub const WALLET_AUTH_TOKEN: &str = "mwaAuthToken";
    /// Wallet address bound to the cached token.
    pub const WALLET_ADDRESS: &str = "mwaBase64Address";
    /// JSON-encoded accepted policy versions.
    pub const POLICY_ACCEPTED: &str = "policyAcceptedVersions";

    /// Every key owned by the auth subsystem, in cleanup order.
    pub const ALL_AUTH_KEYS: &[&str] = &[
        SESSION_ID,
        USER_DATA,
        LAST_ACTIVITY,
        WALLET_AUTH_TOKEN,
        WALLET_ADDRESS,
    ];
}

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

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

    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The durable key/value contract the auth subsystem depends on.
///
/// Implementations must tolerate concurrent readers; the controller only
/// ever writes from one logical task at a time.
pub trait KvStore: Send + Sync {
    /// Read a value, `None` if the key is absent.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
