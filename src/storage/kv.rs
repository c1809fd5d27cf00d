// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Nok Labs

//! Embedded key/value database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `auth_kv`: key → value (both UTF-8 strings)
//!
//! A single table is enough: the auth subsystem stores a handful of small
//! entries (session token, user JSON, activity stamp, wallet credential,
//! accepted policies).

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};

use super::{KvStore, StoreResult};

/// Primary table: key → value.
const AUTH_KV: TableDefinition<&str, &str> = TableDefinition::new("auth_kv");

/// Durable key/value store for one device profile.
pub struct KvDatabase {
    db: Database,
}

impl KvDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(AUTH_KV)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KvStore for KvDatabase {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(AUTH_KV)?;
        let value = table.get(key)?.map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_KV)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(AUTH_KV)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys;

    fn test_db() -> (tempfile::TempDir, KvDatabase) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = KvDatabase::open(&dir.path().join("auth.redb")).expect("open db");
        (dir, db)
    }

    #[test]
    fn put_get_roundtrip() {
        let (_dir, db) = test_db();
        db.put(keys::SESSION_ID, "sess-1").unwrap();
        assert_eq!(db.get(keys::SESSION_ID).unwrap().as_deref(), Some("sess-1"));
    }

    #[test]
    fn get_absent_key_is_none() {
        let (_dir, db) = test_db();
        assert!(db.get("nothing").unwrap().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, db) = test_db();
        db.put(keys::USER_DATA, "{}").unwrap();
        db.remove(keys::USER_DATA).unwrap();
        db.remove(keys::USER_DATA).unwrap();
        assert!(db.get(keys::USER_DATA).unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.redb");
        {
            let db = KvDatabase::open(&path).unwrap();
            db.put(keys::WALLET_AUTH_TOKEN, "tok").unwrap();
        }
        let db = KvDatabase::open(&path).unwrap();
        assert_eq!(
            db.get(keys::WALLET_AUTH_TOKEN).unwrap().as_deref(),
            Some("tok")
        );
    }
}
