// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device-bound symmetric key.
//!
//! Private key material is never stored in the clear. It is encrypted with a
//! 256-bit AES key that only the device holds, and that key refuses to operate
//! unless the user has completed an authentication ceremony within the
//! configured validity window.
//!
//! [`SoftwareDeviceKey`] is the file-backed implementation used by the binary
//! and in tests. A platform keystore can be plugged in behind [`DeviceKey`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES-256 key length in bytes.
pub const AES_KEY_LEN: usize = 32;
/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum DeviceKeyError {
    #[error("user authentication required")]
    AuthenticationRequired,

    #[error("authentication ceremony is older than the validity window")]
    StaleCeremony,

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("device key unavailable: {0}")]
    Unavailable(String),
}

/// How the user proved presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Biometric,
    DeviceCredential,
}

/// Proof that the user authenticated at a given instant.
#[derive(Debug, Clone)]
pub struct AuthCeremony {
    method: AuthMethod,
    completed_at: Instant,
}

impl AuthCeremony {
    /// A ceremony that completed just now.
    pub fn completed(method: AuthMethod) -> Self {
        Self::completed_at(method, Instant::now())
    }

    pub fn completed_at(method: AuthMethod, completed_at: Instant) -> Self {
        Self {
            method,
            completed_at,
        }
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }
}

/// A symmetric key gated on recent user authentication.
pub trait DeviceKey: Send + Sync {
    /// Whether encrypt/decrypt will currently succeed.
    fn is_unlocked(&self) -> bool;

    /// Open the validity window starting at the ceremony's completion time.
    fn unlock(&self, ceremony: &AuthCeremony) -> Result<(), DeviceKeyError>;

    /// Close the validity window immediately.
    fn lock(&self);

    /// Encrypt under a fresh random IV. Returns `(ciphertext, iv)`.
    fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), DeviceKeyError>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, DeviceKeyError>;
}

/// AES-256-CBC/PKCS7 key held in process memory and persisted to a file
/// readable only by the owner.
pub struct SoftwareDeviceKey {
    key: Zeroizing<[u8; AES_KEY_LEN]>,
    validity: Duration,
    unlocked_until: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for SoftwareDeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareDeviceKey")
            .field("validity", &self.validity)
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}

impl SoftwareDeviceKey {
    /// Load the key at `path`, creating it on first use.
    pub fn load_or_create(
        path: impl AsRef<Path>,
        validity: Duration,
    ) -> Result<Self, DeviceKeyError> {
        let path = path.as_ref();
        if path.exists() {
            let raw = Zeroizing::new(
                fs::read(path).map_err(|e| DeviceKeyError::Unavailable(e.to_string()))?,
            );
            let bytes: [u8; AES_KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
                DeviceKeyError::Unavailable(format!(
                    "key file {} has {} bytes, expected {AES_KEY_LEN}",
                    path.display(),
                    raw.len()
                ))
            })?;
            debug!(path = %path.display(), "Loaded device key");
            return Ok(Self::from_key_bytes(bytes, validity));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DeviceKeyError::Unavailable(e.to_string()))?;
        }
        let key = Self::ephemeral(validity);
        write_owner_only(path, &key.key[..])?;
        info!(path = %path.display(), "Created new device key");
        Ok(key)
    }

    /// A random key that lives only as long as this value.
    pub fn ephemeral(validity: Duration) -> Self {
        let mut bytes = [0u8; AES_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self::from_key_bytes(bytes, validity)
    }

    pub fn from_key_bytes(bytes: [u8; AES_KEY_LEN], validity: Duration) -> Self {
        Self {
            key: Zeroizing::new(bytes),
            validity,
            unlocked_until: Mutex::new(None),
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    fn require_unlocked(&self) -> Result<(), DeviceKeyError> {
        if self.is_unlocked() {
            Ok(())
        } else {
            Err(DeviceKeyError::AuthenticationRequired)
        }
    }
}

impl DeviceKey for SoftwareDeviceKey {
    fn is_unlocked(&self) -> bool {
        self.unlocked_until
            .lock()
            .map(|until| until.is_some_and(|t| Instant::now() < t))
            .unwrap_or(false)
    }

    fn unlock(&self, ceremony: &AuthCeremony) -> Result<(), DeviceKeyError> {
        // A zero window can never be opened.
        if self.validity.is_zero() || ceremony.completed_at.elapsed() > self.validity {
            return Err(DeviceKeyError::StaleCeremony);
        }
        let mut until = self
            .unlocked_until
            .lock()
            .map_err(|_| DeviceKeyError::Unavailable("unlock state poisoned".into()))?;
        *until = Some(ceremony.completed_at + self.validity);
        Ok(())
    }

    fn lock(&self) {
        if let Ok(mut until) = self.unlocked_until.lock() {
            *until = None;
        }
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), DeviceKeyError> {
        self.require_unlocked()?;
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let key: &[u8; AES_KEY_LEN] = &self.key;
        let ciphertext = Aes256CbcEnc::new(key.into(), (&iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        Ok((ciphertext, iv))
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        iv: &[u8; IV_LEN],
    ) -> Result<Zeroizing<Vec<u8>>, DeviceKeyError> {
        self.require_unlocked()?;
        let key: &[u8; AES_KEY_LEN] = &self.key;
        Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| DeviceKeyError::Cipher("invalid padding".into()))
    }
}

fn write_owner_only(path: &Path, bytes: &[u8]) -> Result<(), DeviceKeyError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| DeviceKeyError::Unavailable(e.to_string()))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| DeviceKeyError::Unavailable(e.to_string()))
}
