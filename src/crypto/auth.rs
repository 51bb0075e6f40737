// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User authentication ceremonies and the gate that serializes them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::device_key::{AuthCeremony, AuthMethod, DeviceKey, DeviceKeyError};

/// What the authentication surface shows the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPrompt {
    pub title: String,
    pub subtitle: String,
    pub allowed_methods: Vec<AuthMethod>,
}

impl Default for AuthPrompt {
    fn default() -> Self {
        Self {
            title: "Unlock wallet".to_string(),
            subtitle: "Authenticate to access your accounts".to_string(),
            allowed_methods: vec![AuthMethod::Biometric, AuthMethod::DeviceCredential],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("authentication cancelled by user")]
    Cancelled,

    #[error("authentication not recognized")]
    NotRecognized,

    #[error("authentication failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Key(#[from] DeviceKeyError),
}

/// Runs an authentication ceremony on the device (biometric sheet, PIN
/// entry and so on).
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, prompt: &AuthPrompt) -> Result<AuthCeremony, AuthenticationError>;
}

/// Ensures the device key is unlocked, running at most one ceremony at a
/// time. Callers that queue behind a ceremony share its result.
pub struct AuthGate {
    key: Arc<dyn DeviceKey>,
    authenticator: Arc<dyn Authenticator>,
    prompt: AuthPrompt,
    ceremony: Mutex<()>,
}

impl AuthGate {
    pub fn new(key: Arc<dyn DeviceKey>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self::with_prompt(key, authenticator, AuthPrompt::default())
    }

    pub fn with_prompt(
        key: Arc<dyn DeviceKey>,
        authenticator: Arc<dyn Authenticator>,
        prompt: AuthPrompt,
    ) -> Self {
        Self {
            key,
            authenticator,
            prompt,
            ceremony: Mutex::new(()),
        }
    }

    pub fn device_key(&self) -> &Arc<dyn DeviceKey> {
        &self.key
    }

    /// Return once the device key is usable, prompting the user if needed.
    pub async fn ensure_unlocked(&self) -> Result<(), AuthenticationError> {
        if self.key.is_unlocked() {
            return Ok(());
        }

        let _ceremony = self.ceremony.lock().await;
        if self.key.is_unlocked() {
            debug!("Device key unlocked by a concurrent ceremony");
            return Ok(());
        }

        let ceremony = match self.authenticator.authenticate(&self.prompt).await {
            Ok(ceremony) => ceremony,
            Err(e) => {
                warn!(error = %e, "Authentication ceremony failed");
                return Err(e);
            }
        };
        self.key.unlock(&ceremony)?;
        info!(method = ?ceremony.method(), "Device key unlocked");
        Ok(())
    }
}
