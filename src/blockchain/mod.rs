// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana integration.
//!
//! This module provides functionality for:
//! - Ed25519 account keypairs
//! - Signing wire-format transactions and arbitrary messages
//! - Submitting signed transactions over JSON-RPC and awaiting confirmation

pub mod client;
pub mod keypair;
pub mod signing;
pub mod transactions;
pub mod types;

pub use client::{RpcClientError, RpcTransport, SolanaRpcClient};
pub use keypair::Ed25519Keypair;
pub use signing::{sign_message, sign_transaction, SigningError, SigningResult};
pub use transactions::{SendOptions, SubmitError, TransactionSubmitter};
pub use types::*;
