// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Serde adapters for binary fields in session messages.
//!
//! Payloads travel as standard base64; keys and signatures as base58.

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Deserializer, Serializer};

fn decode_base58<E: serde::de::Error>(s: &str) -> Result<Vec<u8>, E> {
    bs58::decode(s).into_vec().map_err(E::custom)
}

fn decode_base58_array<const N: usize, E: serde::de::Error>(s: &str) -> Result<[u8; N], E> {
    let bytes = decode_base58::<E>(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| E::custom(format!("expected {N} bytes, got {}", bytes.len())))
}

pub mod base64_bytes {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        Base64::decode_vec(&encoded).map_err(D::Error::custom)
    }
}

pub mod base64_list {
    use super::*;
    use serde::de::Error as _;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&Base64::encode_string(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|encoded| Base64::decode_vec(encoded).map_err(D::Error::custom))
            .collect()
    }
}

pub mod base58_key {
    use super::*;

    pub fn serialize<S: Serializer>(key: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bs58::encode(key).into_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        decode_base58_array(&String::deserialize(d)?)
    }
}

pub mod base58_signature {
    use super::*;

    pub fn serialize<S: Serializer>(signature: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&bs58::encode(signature).into_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        decode_base58_array(&String::deserialize(d)?)
    }
}

pub mod base58_signatures {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(signatures: &[[u8; 64]], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(signatures.len()))?;
        for signature in signatures {
            seq.serialize_element(&bs58::encode(signature).into_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<[u8; 64]>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|encoded| decode_base58_array(encoded))
            .collect()
    }
}
