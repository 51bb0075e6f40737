// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-wide error taxonomy.
//!
//! Component errors convert into [`WalletError`], which is what the session
//! pipeline reports back to the dapp as a `Failed` outcome.

use crate::blockchain::{RpcClientError, SigningError, SubmitError};
use crate::config::ConfigError;
use crate::crypto::{AuthenticationError, DeviceKeyError, EncryptionError};
use crate::providers::RiskScanError;
use crate::storage::KeyStoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("user authentication required")]
    AuthenticationRequired,

    #[error("stored key failed integrity check: {0}")]
    Integrity(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{} of {} transactions were not submitted", .valid.iter().filter(|ok| !**ok).count(), .valid.len())]
    PartialSubmission { valid: Vec<bool> },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unsupported chain: {0}")]
    InvalidChain(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::Authorization(_) => "authorization_error",
            Self::AuthenticationRequired => "authentication_required",
            Self::Integrity(_) => "integrity_error",
            Self::Transport(_) => "transport_error",
            Self::PartialSubmission { .. } => "partial_submission",
            Self::Timeout(_) => "timeout",
            Self::InvalidChain(_) => "invalid_chain",
            Self::Storage(_) => "storage_error",
            Self::Config(_) => "config_error",
        }
    }
}

impl From<SigningError> for WalletError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::InvalidTransaction(_) => Self::Parse(e.to_string()),
            SigningError::NotARequiredSigner => Self::Authorization(e.to_string()),
        }
    }
}

impl From<DeviceKeyError> for WalletError {
    fn from(e: DeviceKeyError) -> Self {
        match e {
            DeviceKeyError::AuthenticationRequired | DeviceKeyError::StaleCeremony => {
                Self::AuthenticationRequired
            }
            DeviceKeyError::Cipher(msg) => Self::Integrity(msg),
            DeviceKeyError::Unavailable(msg) => Self::Storage(msg),
        }
    }
}

impl From<EncryptionError> for WalletError {
    fn from(e: EncryptionError) -> Self {
        match e {
            EncryptionError::AuthenticationRequired => Self::AuthenticationRequired,
            EncryptionError::Integrity(msg) => Self::Integrity(msg),
            EncryptionError::DeviceKey(msg) => Self::Storage(msg),
        }
    }
}

impl From<AuthenticationError> for WalletError {
    fn from(e: AuthenticationError) -> Self {
        match e {
            AuthenticationError::Key(inner) => inner.into(),
            _ => Self::AuthenticationRequired,
        }
    }
}

impl From<KeyStoreError> for WalletError {
    fn from(e: KeyStoreError) -> Self {
        match e {
            KeyStoreError::Encryption(inner) => inner.into(),
            KeyStoreError::Integrity(msg) => Self::Integrity(msg),
            KeyStoreError::Database(inner) => Self::Storage(inner.to_string()),
            KeyStoreError::Task(msg) => Self::Storage(msg),
        }
    }
}

impl From<RpcClientError> for WalletError {
    fn from(e: RpcClientError) -> Self {
        match e {
            RpcClientError::Timeout(msg) => Self::Timeout(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<SubmitError> for WalletError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::InvalidTransactions { valid } => Self::PartialSubmission { valid },
        }
    }
}

impl From<RiskScanError> for WalletError {
    fn from(e: RiskScanError) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<ConfigError> for WalletError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
