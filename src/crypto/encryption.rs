// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated-at-rest encryption of private key material.
//!
//! Blobs are laid out as `ciphertext || iv`. A 32-byte Ed25519 secret pads
//! to 48 bytes of ciphertext, so stored blobs are always 64 bytes.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::device_key::{DeviceKey, DeviceKeyError, IV_LEN};

/// Ciphertext length for a 32-byte secret under PKCS7.
pub const CIPHERTEXT_LEN: usize = 48;
/// Stored blob length: ciphertext followed by IV.
pub const ENCRYPTED_BLOB_LEN: usize = CIPHERTEXT_LEN + IV_LEN;

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("user authentication required")]
    AuthenticationRequired,

    #[error("encrypted blob failed integrity checks: {0}")]
    Integrity(String),

    #[error("device key error: {0}")]
    DeviceKey(String),
}

impl From<DeviceKeyError> for EncryptionError {
    fn from(e: DeviceKeyError) -> Self {
        match e {
            DeviceKeyError::AuthenticationRequired | DeviceKeyError::StaleCeremony => {
                Self::AuthenticationRequired
            }
            DeviceKeyError::Cipher(msg) => Self::Integrity(msg),
            DeviceKeyError::Unavailable(msg) => Self::DeviceKey(msg),
        }
    }
}

/// Encrypts and decrypts through the device key.
#[derive(Clone)]
pub struct EncryptionService {
    key: Arc<dyn DeviceKey>,
}

impl EncryptionService {
    pub fn new(key: Arc<dyn DeviceKey>) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext` and return `ciphertext || iv`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let (mut blob, iv) = self.key.encrypt(plaintext)?;
        blob.extend_from_slice(&iv);
        Ok(blob)
    }

    /// Decrypt a stored blob. The first 48 bytes are ciphertext, the rest IV.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
        if blob.len() != ENCRYPTED_BLOB_LEN {
            return Err(EncryptionError::Integrity(format!(
                "expected {ENCRYPTED_BLOB_LEN} bytes, got {}",
                blob.len()
            )));
        }
        let (ciphertext, iv) = blob.split_at(CIPHERTEXT_LEN);
        let iv: &[u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| EncryptionError::Integrity("malformed IV".into()))?;
        Ok(self.key.decrypt(ciphertext, iv)?)
    }
}
