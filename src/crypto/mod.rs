// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device key custody and at-rest encryption.

pub mod auth;
pub mod device_key;
pub mod encryption;

pub use auth::{AuthGate, AuthPrompt, AuthenticationError, Authenticator};
pub use device_key::{AuthCeremony, AuthMethod, DeviceKey, DeviceKeyError, SoftwareDeviceKey};
pub use encryption::{EncryptionError, EncryptionService, ENCRYPTED_BLOB_LEN};
