// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana cluster constants and JSON-RPC types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
}

impl Cluster {
    /// Map a dapp-supplied chain identifier (`solana:mainnet`,
    /// `mainnet-beta`, `solana:devnet` ...) to a cluster by substring.
    pub fn from_chain_identifier(chain: &str) -> Option<Self> {
        let chain = chain.to_ascii_lowercase();
        if chain.contains("mainnet") {
            Some(Self::MainnetBeta)
        } else if chain.contains("devnet") {
            Some(Self::Devnet)
        } else if chain.contains("testnet") {
            Some(Self::Testnet)
        } else {
            None
        }
    }

    /// Path segment used by the risk-scan API.
    pub fn scan_segment(self) -> &'static str {
        match self {
            Self::MainnetBeta => "mainnet",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MainnetBeta => "mainnet-beta",
            Self::Devnet => "devnet",
            Self::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet-beta" | "mainnet" => Ok(Self::MainnetBeta),
            "devnet" => Ok(Self::Devnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!(
                "unknown cluster `{other}`, expected mainnet-beta, devnet or testnet"
            )),
        }
    }
}

/// Solana network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    pub cluster: Cluster,
    /// Public RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "Solana Mainnet Beta",
    cluster: Cluster::MainnetBeta,
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

pub const SOLANA_DEVNET: NetworkConfig = NetworkConfig {
    name: "Solana Devnet",
    cluster: Cluster::Devnet,
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com/?cluster=devnet",
};

pub const SOLANA_TESTNET: NetworkConfig = NetworkConfig {
    name: "Solana Testnet",
    cluster: Cluster::Testnet,
    rpc_url: "https://api.testnet.solana.com",
    explorer_url: "https://explorer.solana.com/?cluster=testnet",
};

impl NetworkConfig {
    pub fn for_cluster(cluster: Cluster) -> Self {
        match cluster {
            Cluster::MainnetBeta => SOLANA_MAINNET,
            Cluster::Devnet => SOLANA_DEVNET,
            Cluster::Testnet => SOLANA_TESTNET,
        }
    }
}

/// Commitment levels, ordered by finality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    #[default]
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn ordinal(self) -> i8 {
        match self {
            Self::Processed => 0,
            Self::Confirmed => 1,
            Self::Finalized => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!("unknown commitment `{other}`")),
        }
    }
}

/// Ordinal of a reported confirmation status. Missing or unrecognized
/// statuses rank below `processed`.
pub fn commitment_ordinal(status: Option<&str>) -> i8 {
    status
        .and_then(|s| s.parse::<Commitment>().ok())
        .map_or(-1, Commitment::ordinal)
}

/// Per-signature entry of `getSignatureStatuses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

/// `getSignatureStatuses` result. `value` lines up with the queried
/// signatures; unknown signatures are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureStatusesResponse {
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    pub value: Vec<Option<SignatureStatus>>,
}

/// Config object for `sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionConfig {
    pub encoding: &'static str,
    pub preflight_commitment: Commitment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_context_slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_preflight: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u64>,
}

impl Default for SendTransactionConfig {
    fn default() -> Self {
        Self {
            encoding: "base64",
            preflight_commitment: Commitment::Processed,
            min_context_slot: None,
            skip_preflight: None,
            max_retries: None,
        }
    }
}
