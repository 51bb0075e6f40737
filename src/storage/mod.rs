// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Storage
//!
//! Persistent custody of the wallet's Ed25519 keypairs.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   keys/keys.redb       # Public key -> encrypted secret (ciphertext || iv)
//!   device/storage.key   # Device AES key, mode 0600
//! ```
//!
//! Secrets only ever reach disk encrypted through the device key, which
//! itself refuses to operate without recent user authentication.

pub mod key_database;
pub mod key_store;
pub mod paths;

pub use key_database::{KeyDatabase, KeyDbError, KeyRecord};
pub use key_store::{encode_public_key, KeyStore, KeyStoreError};
pub use paths::StoragePaths;
