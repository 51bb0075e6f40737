// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted keypair store.
//!
//! Secrets are encrypted through the device key before they reach the
//! database and decrypted only on lookup. Database access runs on the
//! blocking pool so callers on the async runtime never stall on disk I/O.

use std::sync::Arc;

use base64ct::{Base64Unpadded, Encoding};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::key_database::{KeyDatabase, KeyDbError, KeyRecord};
use crate::blockchain::keypair::{Ed25519Keypair, SECRET_KEY_LEN};
use crate::crypto::{EncryptionError, EncryptionService};

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error(transparent)]
    Database(#[from] KeyDbError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error("stored key failed integrity check: {0}")]
    Integrity(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl KeyStoreError {
    /// Whether the failure clears after the user authenticates again.
    pub fn is_authentication_required(&self) -> bool {
        matches!(
            self,
            Self::Encryption(EncryptionError::AuthenticationRequired)
        )
    }
}

/// Encode a public key the way it is keyed in the database.
pub fn encode_public_key(public_key: &[u8]) -> String {
    Base64Unpadded::encode_string(public_key)
}

pub struct KeyStore {
    db: Arc<KeyDatabase>,
    encryption: EncryptionService,
}

impl KeyStore {
    pub fn new(db: Arc<KeyDatabase>, encryption: EncryptionService) -> Self {
        Self { db, encryption }
    }

    /// Generate a keypair, persist it, and return it.
    pub async fn generate_keypair(&self) -> Result<Ed25519Keypair, KeyStoreError> {
        let keypair = Ed25519Keypair::generate();
        self.insert_keypair(&keypair).await?;
        Ok(keypair)
    }

    /// Encrypt and persist an existing keypair. Returns the assigned id.
    pub async fn insert_keypair(&self, keypair: &Ed25519Keypair) -> Result<u64, KeyStoreError> {
        let encrypted = self.encryption.encrypt(&keypair.secret_bytes()[..])?;
        let public_key = encode_public_key(&keypair.public_key());

        let record = self
            .blocking(move |db| db.insert(&public_key, &encrypted))
            .await?;
        info!(id = record.id, public_key = %record.public_key_b64, "Stored new keypair");
        Ok(record.id)
    }

    /// Look up the keypair for a public key. `None` if it is not stored.
    pub async fn get_keypair(
        &self,
        public_key: &[u8],
    ) -> Result<Option<Ed25519Keypair>, KeyStoreError> {
        let encoded = encode_public_key(public_key);
        let record = self.blocking(move |db| db.get(&encoded)).await?;
        record.map(|r| self.restore(&r)).transpose()
    }

    /// The earliest stored keypair, if any.
    pub async fn get_existing_keypair(&self) -> Result<Option<Ed25519Keypair>, KeyStoreError> {
        let record = self.blocking(|db| db.first()).await?;
        record.map(|r| self.restore(&r)).transpose()
    }

    /// Raw public keys of every stored keypair, ordered by id.
    pub async fn list_public_keys(&self) -> Result<Vec<Vec<u8>>, KeyStoreError> {
        let encoded = self.blocking(|db| db.public_keys()).await?;
        encoded
            .iter()
            .map(|key| {
                Base64Unpadded::decode_vec(key)
                    .map_err(|e| KeyStoreError::Integrity(format!("public key {key}: {e}")))
            })
            .collect()
    }

    fn restore(&self, record: &KeyRecord) -> Result<Ed25519Keypair, KeyStoreError> {
        let plaintext = self.encryption.decrypt(&record.encrypted_private_key)?;
        let secret: Zeroizing<[u8; SECRET_KEY_LEN]> =
            Zeroizing::new(plaintext.as_slice().try_into().map_err(|_| {
                KeyStoreError::Integrity(format!(
                    "decrypted secret for key {} has {} bytes",
                    record.id,
                    plaintext.len()
                ))
            })?);

        let keypair = Ed25519Keypair::from_secret_bytes(&secret);
        if encode_public_key(&keypair.public_key()) != record.public_key_b64 {
            return Err(KeyStoreError::Integrity(format!(
                "secret for key {} does not match its public key",
                record.id
            )));
        }
        debug!(id = record.id, "Restored keypair");
        Ok(keypair)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, KeyStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&KeyDatabase) -> Result<T, KeyDbError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| KeyStoreError::Task(e.to_string()))?
            .map_err(KeyStoreError::from)
    }
}
