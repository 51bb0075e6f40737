// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana JSON-RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::types::{NetworkConfig, SendTransactionConfig, SignatureStatusesResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur talking to a Solana RPC node.
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC request failed: {0}")]
    Transport(String),

    #[error("RPC request timed out: {0}")]
    Timeout(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("RPC response was invalid: {0}")]
    InvalidResponse(String),
}

/// The two RPC methods the submitter needs.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Submit a base64-encoded signed transaction. Returns its signature.
    async fn send_transaction(
        &self,
        transaction_base64: &str,
        config: &SendTransactionConfig,
    ) -> Result<String, RpcClientError>;

    /// Look up statuses for base58 signatures without searching history.
    async fn get_signature_statuses(
        &self,
        signatures: &[String],
    ) -> Result<SignatureStatusesResponse, RpcClientError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over HTTP.
pub struct SolanaRpcClient {
    endpoint: url::Url,
    http: Client,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    pub fn new(endpoint: &str) -> Result<Self, RpcClientError> {
        let endpoint: url::Url = endpoint
            .parse()
            .map_err(|e: url::ParseError| RpcClientError::InvalidRpcUrl(e.to_string()))?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RpcClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Client for a network's public endpoint.
    pub fn for_network(network: &NetworkConfig) -> Result<Self, RpcClientError> {
        Self::new(network.rpc_url)
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcClientError::Timeout(format!("{method}: {e}"))
                } else {
                    RpcClientError::Transport(format!("{method}: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RpcClientError::Transport(format!(
                "{method} returned {status}: {body}"
            )));
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcClientError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(RpcClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        debug!(method, id, "RPC call succeeded");
        parsed
            .result
            .ok_or_else(|| RpcClientError::InvalidResponse(format!("{method} returned no result")))
    }
}

#[async_trait]
impl RpcTransport for SolanaRpcClient {
    async fn send_transaction(
        &self,
        transaction_base64: &str,
        config: &SendTransactionConfig,
    ) -> Result<String, RpcClientError> {
        self.call("sendTransaction", json!([transaction_base64, config]))
            .await
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[String],
    ) -> Result<SignatureStatusesResponse, RpcClientError> {
        self.call(
            "getSignatureStatuses",
            json!([signatures, { "searchTransactionHistory": false }]),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(matches!(
            SolanaRpcClient::new("not a url"),
            Err(RpcClientError::InvalidRpcUrl(_))
        ));
    }

    #[tokio::test]
    async fn send_transaction_posts_base64_with_config() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .body_contains("\"method\":\"sendTransaction\"")
                    .body_contains("\"AQID\"")
                    .body_contains("\"encoding\":\"base64\"")
                    .body_contains("\"preflightCommitment\":\"confirmed\"");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW"
                }));
            })
            .await;

        let client = SolanaRpcClient::new(&server.url("/")).unwrap();
        let config = SendTransactionConfig {
            preflight_commitment: crate::blockchain::Commitment::Confirmed,
            ..Default::default()
        };
        let signature = client.send_transaction("AQID", &config).await.unwrap();

        mock.assert_async().await;
        assert!(signature.starts_with("5VERv8"));
    }

    #[tokio::test]
    async fn signature_statuses_disable_history_search() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .body_contains("\"method\":\"getSignatureStatuses\"")
                    .body_contains("\"searchTransactionHistory\":false");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "context": { "slot": 100 },
                        "value": [ { "slot": 99, "confirmations": null, "err": null, "confirmationStatus": "finalized" } ]
                    }
                }));
            })
            .await;

        let client = SolanaRpcClient::new(&server.url("/")).unwrap();
        let statuses = client
            .get_signature_statuses(&["sig".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(
            statuses.value[0].as_ref().unwrap().confirmation_status.as_deref(),
            Some("finalized")
        );
    }

    #[tokio::test]
    async fn rpc_error_object_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32002, "message": "Transaction simulation failed" }
                }));
            })
            .await;

        let client = SolanaRpcClient::new(&server.url("/")).unwrap();
        let err = client
            .send_transaction("AQID", &SendTransactionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcClientError::Rpc { code: -32002, .. }));
    }

    #[tokio::test]
    async fn http_failure_is_transport_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("unavailable");
            })
            .await;

        let client = SolanaRpcClient::new(&server.url("/")).unwrap();
        let err = client
            .send_transaction("AQID", &SendTransactionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcClientError::Transport(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn null_result_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .json_body(serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": null }));
            })
            .await;

        let client = SolanaRpcClient::new(&server.url("/")).unwrap();
        let err = client
            .send_transaction("AQID", &SendTransactionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RpcClientError::InvalidResponse(_)));
    }
}
