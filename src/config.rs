// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the signer. Configuration is loaded from the environment once
//! at startup and passed explicitly to the services that need it.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the key database and device key | `./data` |
//! | `SOLANA_CLUSTER` | Cluster served by this wallet (`mainnet-beta`, `devnet`, `testnet`) | `devnet` |
//! | `SOLANA_RPC_URL` | JSON-RPC endpoint used for transaction submission | cluster default |
//! | `RISK_SCAN_BASE_URL` | Transaction risk-scan API base URL | `https://api.blowfish.xyz` |
//! | `RISK_SCAN_API_KEY` | Risk-scan API key | empty |
//! | `AUTH_VALIDITY_SECS` | Device key validity window after authentication | `300` |
//! | `SCAN_TIMEOUT_SECS` | Overall transaction scan timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |
//! | `AUTO_APPROVE` | Harness only: approve every presented request | `false` |

use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::{Cluster, NetworkConfig};
use crate::logging::LogFormat;
use crate::providers::risk_scan::DEFAULT_BASE_URL as DEFAULT_RISK_SCAN_BASE_URL;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
/// Environment variable name for the served cluster.
pub const CLUSTER_ENV: &str = "SOLANA_CLUSTER";
/// Environment variable name for the JSON-RPC endpoint override.
pub const RPC_URL_ENV: &str = "SOLANA_RPC_URL";
/// Environment variable name for the risk-scan API base URL.
pub const RISK_SCAN_BASE_URL_ENV: &str = "RISK_SCAN_BASE_URL";
/// Environment variable name for the risk-scan API key.
pub const RISK_SCAN_API_KEY_ENV: &str = "RISK_SCAN_API_KEY";
/// Environment variable name for the device key validity window.
pub const AUTH_VALIDITY_ENV: &str = "AUTH_VALIDITY_SECS";
/// Environment variable name for the scan timeout.
pub const SCAN_TIMEOUT_ENV: &str = "SCAN_TIMEOUT_SECS";
/// Environment variable name for the log format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
/// Environment variable name for the harness auto-approval switch.
pub const AUTO_APPROVE_ENV: &str = "AUTO_APPROVE";

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";
/// Default device key validity window (five minutes).
pub const DEFAULT_AUTH_VALIDITY: Duration = Duration::from_secs(300);
/// Default overall scan timeout.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub risk_scan_base_url: String,
    pub risk_scan_api_key: String,
    pub auth_validity: Duration,
    pub scan_timeout: Duration,
    pub log_format: LogFormat,
    pub auto_approve: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let cluster = match var(CLUSTER_ENV) {
            Some(raw) => raw.parse::<Cluster>().map_err(|reason| ConfigError::Invalid {
                name: CLUSTER_ENV,
                reason,
            })?,
            None => Cluster::Devnet,
        };
        let network = NetworkConfig::for_cluster(cluster);

        let rpc_url = var(RPC_URL_ENV).unwrap_or_else(|| network.rpc_url.to_string());
        url::Url::parse(&rpc_url).map_err(|e| ConfigError::Invalid {
            name: RPC_URL_ENV,
            reason: e.to_string(),
        })?;

        let risk_scan_base_url =
            var(RISK_SCAN_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_RISK_SCAN_BASE_URL.to_string());

        Ok(Self {
            data_dir: var(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            network,
            rpc_url,
            risk_scan_base_url,
            risk_scan_api_key: var(RISK_SCAN_API_KEY_ENV).unwrap_or_default(),
            auth_validity: parse_secs(AUTH_VALIDITY_ENV, var(AUTH_VALIDITY_ENV))?
                .unwrap_or(DEFAULT_AUTH_VALIDITY),
            scan_timeout: parse_secs(SCAN_TIMEOUT_ENV, var(SCAN_TIMEOUT_ENV))?
                .unwrap_or(DEFAULT_SCAN_TIMEOUT),
            log_format: var(LOG_FORMAT_ENV)
                .map(|v| LogFormat::from_env_value(&v))
                .unwrap_or_default(),
            auto_approve: var(AUTO_APPROVE_ENV)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn parse_secs(name: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: format!("{value:?}: {e}"),
            })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.network.cluster, Cluster::Devnet);
        assert_eq!(config.rpc_url, NetworkConfig::for_cluster(Cluster::Devnet).rpc_url);
        assert_eq!(config.risk_scan_base_url, DEFAULT_RISK_SCAN_BASE_URL);
        assert_eq!(config.auth_validity, DEFAULT_AUTH_VALIDITY);
        assert_eq!(config.scan_timeout, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.auto_approve);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/tmp/mwallet"),
            (CLUSTER_ENV, "mainnet-beta"),
            (RPC_URL_ENV, "http://127.0.0.1:8899"),
            (AUTH_VALIDITY_ENV, "60"),
            (LOG_FORMAT_ENV, "json"),
            (AUTO_APPROVE_ENV, "true"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/mwallet"));
        assert_eq!(config.network.cluster, Cluster::MainnetBeta);
        assert_eq!(config.rpc_url, "http://127.0.0.1:8899");
        assert_eq!(config.auth_validity, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.auto_approve);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[(SCAN_TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == SCAN_TIMEOUT_ENV));
    }

    #[test]
    fn invalid_rpc_url_is_rejected() {
        let err = Config::from_lookup(lookup(&[(RPC_URL_ENV, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == RPC_URL_ENV));
    }
}
