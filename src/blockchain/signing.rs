// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction and message signing.
//!
//! Transactions arrive in Solana wire format (legacy or versioned). The
//! wallet's signature is placed in the slot matching its position among the
//! required signers, and all other slots are left untouched.

use bincode::Options;
use solana_transaction::versioned::VersionedTransaction;
use tracing::debug;

use super::keypair::Ed25519Keypair;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;
/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("Provided bytes do not represent a valid Solana transaction: {0}")]
    InvalidTransaction(String),

    #[error("Transaction does not require a signature with the requested keypair")]
    NotARequiredSigner,
}

/// A signed payload together with the signature the wallet produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningResult {
    pub signed_payload: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

/// Sign a serialized transaction with `keypair`.
///
/// The key must appear among the message's static account keys. Within the
/// required-signer range the signature goes into the matching slot and the
/// other slots are kept. A key outside that range replaces the signature
/// list with its own signature alone.
///
/// # Arguments
/// * `transaction` - Wire-format transaction bytes, with nothing trailing
/// * `keypair` - Must be one of the transaction's accounts
///
/// # Returns
/// * `Ok(SigningResult)` - The re-serialized transaction and its new signature
/// * `Err(SigningError)` - If the bytes do not parse or the key is not an account
pub fn sign_transaction(
    transaction: &[u8],
    keypair: &Ed25519Keypair,
) -> Result<SigningResult, SigningError> {
    let mut tx: VersionedTransaction = bincode::options()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(transaction)
        .map_err(|e| SigningError::InvalidTransaction(e.to_string()))?;

    let public_key = keypair.public_key();
    let required = usize::from(tx.message.header().num_required_signatures);
    let position = tx
        .message
        .static_account_keys()
        .iter()
        .position(|key| key.as_ref() == public_key.as_slice())
        .ok_or(SigningError::NotARequiredSigner)?;

    let signature = keypair.sign(&tx.message.serialize());
    if position < required {
        if tx.signatures.len() < required {
            tx.signatures.resize(required, Default::default());
        }
        tx.signatures[position] = signature.into();
    } else {
        tx.signatures = vec![signature.into()];
    }

    let signed_payload = bincode::serialize(&tx)
        .map_err(|e| SigningError::InvalidTransaction(e.to_string()))?;
    debug!(position, required, "Signed transaction");

    Ok(SigningResult {
        signed_payload,
        signature,
    })
}

/// Sign an arbitrary message. The signed payload is the message followed by
/// the 64-byte signature.
pub fn sign_message(message: &[u8], keypair: &Ed25519Keypair) -> SigningResult {
    let signature = keypair.sign(message);
    let mut signed_payload = Vec::with_capacity(message.len() + SIGNATURE_LEN);
    signed_payload.extend_from_slice(message);
    signed_payload.extend_from_slice(&signature);
    SigningResult {
        signed_payload,
        signature,
    }
}

/// Hand-assembled wire-format transactions for tests.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{PUBLIC_KEY_LEN, SIGNATURE_LEN};

    /// A legacy transaction with no instructions.
    ///
    /// `signers` become the required signers (all writable), `others` are
    /// read-only unsigned accounts. Signature slots are zero-filled.
    pub fn legacy_transaction(
        signers: &[[u8; PUBLIC_KEY_LEN]],
        others: &[[u8; PUBLIC_KEY_LEN]],
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(signers.len() as u8);
        bytes.extend(std::iter::repeat(0u8).take(signers.len() * SIGNATURE_LEN));
        bytes.extend_from_slice(&legacy_message(signers, others));
        bytes
    }

    /// The message portion of [`legacy_transaction`].
    pub fn legacy_message(
        signers: &[[u8; PUBLIC_KEY_LEN]],
        others: &[[u8; PUBLIC_KEY_LEN]],
    ) -> Vec<u8> {
        let mut bytes = vec![signers.len() as u8, 0, others.len() as u8];
        bytes.push((signers.len() + others.len()) as u8);
        for key in signers.iter().chain(others) {
            bytes.extend_from_slice(key);
        }
        bytes.extend_from_slice(&[7u8; 32]);
        bytes.push(0);
        bytes
    }
}
