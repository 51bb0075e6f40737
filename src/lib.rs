// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! mwallet-signer - Mobile Solana Wallet Signing Backend
//!
//! Custodies an Ed25519 keypair encrypted under a device-bound key and runs
//! the dapp session pipeline that authorizes, signs and submits on the
//! user's behalf.
//!
//! ## Modules
//!
//! - `blockchain` - Solana keypairs, transaction signing, JSON-RPC submission
//! - `crypto` - Device key, authentication gate, key encryption
//! - `providers` - Risk-scan API client
//! - `scanner` - Background transaction scanning
//! - `session` - Request types and the session pipeline
//! - `storage` - Encrypted keypair store (redb)

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod providers;
pub mod scanner;
pub mod session;
pub mod storage;
