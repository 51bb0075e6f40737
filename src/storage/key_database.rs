// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded key database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `keys`: base64 public key → serialized [`KeyRecord`]
//! - `key_ids`: record id → base64 public key (insertion order)
//! - `meta`: counter name → value (`next_key_id`)

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::crypto::ENCRYPTED_BLOB_LEN;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: base64 public key → serialized KeyRecord (JSON bytes).
const KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("keys");

/// Index: record id → base64 public key, for ordered listing.
const KEY_IDS: TableDefinition<u64, &str> = TableDefinition::new("key_ids");

const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_KEY_ID: &str = "next_key_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum KeyDbError {
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

    #[error("key already stored: {0}")]
    AlreadyExists(String),

    #[error("invalid key record: {0}")]
    InvalidRecord(String),
}

pub type KeyDbResult<T> = Result<T, KeyDbError>;

// =============================================================================
// Records
// =============================================================================

/// A stored keypair. The private half is only present encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub id: u64,
    /// Unpadded standard base64 of the 32-byte public key.
    pub public_key_b64: String,
    /// `ciphertext || iv`, always 64 bytes.
    pub encrypted_private_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// KeyDatabase
// =============================================================================

pub struct KeyDatabase {
    db: Database,
}

impl KeyDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> KeyDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KEYS)?;
            let _ = write_txn.open_table(KEY_IDS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Store a new record and assign it the next id.
    ///
    /// Fails with [`KeyDbError::AlreadyExists`] if the public key is present.
    pub fn insert(
        &self,
        public_key_b64: &str,
        encrypted_private_key: &[u8],
    ) -> KeyDbResult<KeyRecord> {
        if encrypted_private_key.len() != ENCRYPTED_BLOB_LEN {
            return Err(KeyDbError::InvalidRecord(format!(
                "encrypted private key must be {ENCRYPTED_BLOB_LEN} bytes, got {}",
                encrypted_private_key.len()
            )));
        }

        let write_txn = self.db.begin_write()?;
        let record = {
            let mut keys = write_txn.open_table(KEYS)?;
            if keys.get(public_key_b64)?.is_some() {
                return Err(KeyDbError::AlreadyExists(public_key_b64.to_string()));
            }

            let mut meta = write_txn.open_table(META)?;
            let id = meta.get(NEXT_KEY_ID)?.map(|v| v.value()).unwrap_or(1);

            let record = KeyRecord {
                id,
                public_key_b64: public_key_b64.to_string(),
                encrypted_private_key: encrypted_private_key.to_vec(),
                created_at: Utc::now(),
            };
            let json = serde_json::to_vec(&record)?;
            keys.insert(public_key_b64, json.as_slice())?;

            let mut ids = write_txn.open_table(KEY_IDS)?;
            ids.insert(id, public_key_b64)?;
            meta.insert(NEXT_KEY_ID, id + 1)?;
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    pub fn get(&self, public_key_b64: &str) -> KeyDbResult<Option<KeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KEYS)?;
        match table.get(public_key_b64)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// The record with the lowest id, if any.
    pub fn first(&self) -> KeyDbResult<Option<KeyRecord>> {
        let read_txn = self.db.begin_read()?;
        let ids = read_txn.open_table(KEY_IDS)?;
        let public_key = match ids.iter()?.next() {
            Some(entry) => {
                let (_, public_key) = entry?;
                public_key.value().to_string()
            }
            None => return Ok(None),
        };

        let keys = read_txn.open_table(KEYS)?;
        match keys.get(public_key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Err(KeyDbError::InvalidRecord(format!(
                "id index references missing key {public_key}"
            ))),
        }
    }

    /// All stored public keys (base64), ordered by id.
    pub fn public_keys(&self) -> KeyDbResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let ids = read_txn.open_table(KEY_IDS)?;
        let mut keys = Vec::new();
        for entry in ids.iter()? {
            let (_, public_key) = entry?;
            keys.push(public_key.value().to_string());
        }
        Ok(keys)
    }
}

// =============================================================================
// Tests
// =============================================================================
