// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction risk-scan API integration.
//!
//! Simulates unsigned transactions against the cluster and reports the
//! recommended action, warnings, and the balance changes each account should
//! expect.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::blockchain::Cluster;

pub const DEFAULT_BASE_URL: &str = "https://api.blowfish.xyz";
const API_VERSION: &str = "2023-06-05";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum RiskScanError {
    #[error("risk scan request failed: {0}")]
    Request(String),

    #[error("risk scan returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("risk scan response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTransactionsRequest {
    /// Base58-encoded unsigned transactions.
    pub transactions: Vec<String>,
    /// Base58 account the scan is evaluated for.
    pub user_account: String,
    pub metadata: ScanMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanMetadata {
    pub origin: String,
}

impl ScanTransactionsRequest {
    pub fn new(transactions: &[Vec<u8>], signer: &[u8], origin: &str) -> Self {
        Self {
            transactions: transactions
                .iter()
                .map(|tx| bs58::encode(tx).into_string())
                .collect(),
            user_account: bs58::encode(signer).into_string(),
            metadata: ScanMetadata {
                origin: origin.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTransactionsResponse {
    #[serde(rename = "aggregated")]
    pub summary: ScanSummary,
    #[serde(default)]
    pub per_transaction: Vec<Value>,
    #[serde(default)]
    pub request_id: String,
}

/// Aggregated verdict across all scanned transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Recommended action, e.g. `NONE`, `WARN`, `BLOCK`.
    pub action: String,
    #[serde(default)]
    pub warnings: Vec<ScanWarning>,
    #[serde(default)]
    pub error: Option<ScanFailure>,
    /// Account (base58) → expected changes for that account.
    #[serde(default)]
    pub expected_state_changes: BTreeMap<String, Vec<ExpectedStateChange>>,
}

impl ScanSummary {
    /// Expected changes for one account. Empty if the scan reported none.
    pub fn state_changes_for(&self, account: &str) -> &[ExpectedStateChange] {
        self.expected_state_changes
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningSeverity {
    Critical,
    Warning,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub severity: WarningSeverity,
    pub kind: String,
    pub message: String,
}

/// The scanner could not simulate the transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub kind: String,
    #[serde(rename = "humanReadableError")]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestedColor {
    Credit,
    Debit,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedStateChange {
    pub human_readable_diff: String,
    pub suggested_color: SuggestedColor,
    #[serde(default)]
    pub raw_info: Value,
}

/// A service that can simulate transactions before they are signed.
#[async_trait]
pub trait RiskScanService: Send + Sync {
    async fn scan_transactions(
        &self,
        cluster: Cluster,
        request: &ScanTransactionsRequest,
    ) -> Result<ScanTransactionsResponse, RiskScanError>;
}

#[derive(Debug, Clone)]
pub struct RiskScanClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl RiskScanClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RiskScanError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RiskScanError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    fn scan_url(&self, cluster: Cluster) -> String {
        format!(
            "{}/solana/v0/{}/scan/transactions",
            self.base_url,
            cluster.scan_segment()
        )
    }
}

#[async_trait]
impl RiskScanService for RiskScanClient {
    async fn scan_transactions(
        &self,
        cluster: Cluster,
        request: &ScanTransactionsRequest,
    ) -> Result<ScanTransactionsResponse, RiskScanError> {
        debug!(%cluster, count = request.transactions.len(), "Requesting transaction scan");

        let response = self
            .http
            .post(self.scan_url(cluster))
            .header("X-Api-Version", API_VERSION)
            .header("X-Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| RiskScanError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RiskScanError::Status { status, body });
        }

        let parsed: ScanTransactionsResponse = response
            .json()
            .await
            .map_err(|e| RiskScanError::InvalidResponse(e.to_string()))?;
        info!(
            request_id = %parsed.request_id,
            action = %parsed.summary.action,
            warnings = parsed.summary.warnings.len(),
            "Transaction scan complete"
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn sample_response() -> Value {
        json!({
            "aggregated": {
                "action": "WARN",
                "warnings": [
                    { "severity": "WARNING", "kind": "UNUSUAL_TRANSFER", "message": "Unusual transfer" },
                    { "severity": "INFO", "kind": "SOMETHING_NEW", "message": "Unknown severity" }
                ],
                "error": null,
                "expectedStateChanges": {
                    "Wallet1111": [
                        { "humanReadableDiff": "Send 1 SOL", "suggestedColor": "DEBIT", "rawInfo": { "kind": "SOL_TRANSFER" } },
                        { "humanReadableDiff": "Receive 5 USDC", "suggestedColor": "CREDIT", "rawInfo": {} }
                    ]
                }
            },
            "perTransaction": [ {} ],
            "requestId": "req-1"
        })
    }

    #[test]
    fn request_encodes_base58() {
        let request = ScanTransactionsRequest::new(&[vec![0, 1, 2]], &[0u8; 32], "https://dapp.example");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["transactions"][0], "15T");
        assert_eq!(body["userAccount"], "11111111111111111111111111111111");
        assert_eq!(body["metadata"]["origin"], "https://dapp.example");
    }

    #[test]
    fn summary_parses_and_looks_up_changes() {
        let response: ScanTransactionsResponse =
            serde_json::from_value(sample_response()).unwrap();
        let summary = &response.summary;

        assert_eq!(summary.action, "WARN");
        assert_eq!(summary.warnings[0].severity, WarningSeverity::Warning);
        assert_eq!(summary.warnings[1].severity, WarningSeverity::Other);
        let changes = summary.state_changes_for("Wallet1111");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].suggested_color, SuggestedColor::Debit);
        assert_eq!(changes[1].suggested_color, SuggestedColor::Credit);
        assert!(summary.state_changes_for("Other").is_empty());
    }

    #[tokio::test]
    async fn posts_to_cluster_path_with_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/solana/v0/devnet/scan/transactions")
                    .header("x-api-version", "2023-06-05")
                    .header("x-api-key", "test-key")
                    .json_body_partial(r#"{ "metadata": { "origin": "https://dapp.example" } }"#);
                then.status(200).json_body(sample_response());
            })
            .await;

        let client = RiskScanClient::new(&server.base_url(), "test-key").unwrap();
        let request = ScanTransactionsRequest::new(&[vec![1, 2, 3]], &[1u8; 32], "https://dapp.example");
        let response = client
            .scan_transactions(Cluster::Devnet, &request)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.request_id, "req-1");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401).body("bad key");
            })
            .await;

        let client = RiskScanClient::new(&server.base_url(), "wrong").unwrap();
        let request = ScanTransactionsRequest::new(&[vec![1]], &[1u8; 32], "");
        let err = client
            .scan_transactions(Cluster::MainnetBeta, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, RiskScanError::Status { status: 401, ref body } if body == "bad key"));
    }
}
