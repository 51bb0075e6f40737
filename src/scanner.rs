// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Background transaction risk scanning.
//!
//! A scan runs alongside the approval prompt and never blocks signing. Its
//! state is published through a [`ScanHandle`]; dropping the handle cancels
//! the scan if it is still running.
//!
//! Uses `tokio_util::sync::CancellationToken` for cancellation, following
//! the same pattern as the session pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::blockchain::Cluster;
use crate::providers::risk_scan::{RiskScanService, ScanSummary, ScanTransactionsRequest};

/// Progress of one scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    InProgress,
    Succeeded(ScanSummary),
    /// The scan service could not be reached or returned an error.
    Failed(String),
    /// The request cannot be scanned at all (for example an unknown chain).
    NotScannable(String),
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        match self {
            Self::Succeeded(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Observes a scan. Dropping it cancels the scan.
pub struct ScanHandle {
    state: watch::Receiver<ScanState>,
    _cancel_on_drop: Option<DropGuard>,
}

impl ScanHandle {
    fn resolved(state: ScanState) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            state: rx,
            _cancel_on_drop: None,
        }
    }

    /// Current state without waiting.
    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    /// Another receiver for the same scan, for forwarding updates.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    /// Wait for a terminal state.
    pub async fn settled(&mut self) -> ScanState {
        loop {
            let current = self.state.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().clone();
            }
        }
    }
}

pub struct TransactionScanner {
    service: Arc<dyn RiskScanService>,
    timeout: Duration,
}

impl TransactionScanner {
    pub fn new(service: Arc<dyn RiskScanService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Start scanning `transactions` for `signer` and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn scan_transactions_async(
        &self,
        chain: &str,
        signer: &[u8],
        transactions: &[Vec<u8>],
        origin: &str,
    ) -> ScanHandle {
        let Some(cluster) = Cluster::from_chain_identifier(chain) else {
            info!(%chain, "Skipping scan for unrecognized chain");
            return ScanHandle::resolved(ScanState::NotScannable(format!(
                "Cannot simulate transactions, provided chain is invalid: {chain}"
            )));
        };

        let request = ScanTransactionsRequest::new(transactions, signer, origin);
        let (tx, rx) = watch::channel(ScanState::InProgress);
        let cancel = CancellationToken::new();
        let service = self.service.clone();
        let timeout = self.timeout;

        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(%cluster, "Transaction scan abandoned");
                    }
                    result = tokio::time::timeout(timeout, service.scan_transactions(cluster, &request)) => {
                        let state = match result {
                            Ok(Ok(response)) => ScanState::Succeeded(response.summary),
                            Ok(Err(e)) => {
                                warn!(%cluster, error = %e, "Transaction scan failed");
                                ScanState::Failed(e.to_string())
                            }
                            Err(_) => {
                                warn!(%cluster, timeout_secs = timeout.as_secs(), "Transaction scan timed out");
                                ScanState::Failed(format!("scan timed out after {timeout:?}"))
                            }
                        };
                        let _ = tx.send(state);
                    }
                }
            }
        });

        ScanHandle {
            state: rx,
            _cancel_on_drop: Some(cancel.drop_guard()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::risk_scan::{RiskScanError, ScanTransactionsResponse};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn summary(action: &str) -> ScanSummary {
        ScanSummary {
            action: action.to_string(),
            warnings: Vec::new(),
            error: None,
            expected_state_changes: BTreeMap::new(),
        }
    }

    struct FakeScan {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
        finished: AtomicBool,
    }

    impl FakeScan {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
                finished: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl RiskScanService for FakeScan {
        async fn scan_transactions(
            &self,
            cluster: Cluster,
            request: &ScanTransactionsRequest,
        ) -> Result<ScanTransactionsResponse, RiskScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            if self.fail {
                return Err(RiskScanError::Status {
                    status: 500,
                    body: "boom".into(),
                });
            }
            assert_eq!(cluster, Cluster::Devnet);
            assert_eq!(request.transactions.len(), 1);
            Ok(ScanTransactionsResponse {
                summary: summary("NONE"),
                per_transaction: Vec::new(),
                request_id: "req".into(),
            })
        }
    }

    #[tokio::test]
    async fn invalid_chain_is_not_scannable_without_network_call() {
        let service = FakeScan::new(Duration::ZERO, false);
        let scanner = TransactionScanner::new(service.clone(), Duration::from_secs(5));

        let handle = scanner.scan_transactions_async("solana:localnet", &[1u8; 32], &[vec![1]], "");

        assert_eq!(
            handle.state(),
            ScanState::NotScannable(
                "Cannot simulate transactions, provided chain is invalid: solana:localnet".into()
            )
        );
        tokio::task::yield_now().await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_scan_publishes_summary() {
        let service = FakeScan::new(Duration::from_millis(10), false);
        let scanner = TransactionScanner::new(service, Duration::from_secs(5));

        let mut handle = scanner.scan_transactions_async("solana:devnet", &[1u8; 32], &[vec![1]], "https://dapp");
        assert_eq!(handle.state(), ScanState::InProgress);

        let settled = handle.settled().await;
        assert_eq!(settled.summary().map(|s| s.action.as_str()), Some("NONE"));
    }

    #[tokio::test]
    async fn service_error_is_failed() {
        let service = FakeScan::new(Duration::ZERO, true);
        let scanner = TransactionScanner::new(service, Duration::from_secs(5));

        let mut handle = scanner.scan_transactions_async("devnet", &[1u8; 32], &[vec![1]], "");
        assert!(matches!(handle.settled().await, ScanState::Failed(msg) if msg.contains("500")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_scan_times_out_as_failed() {
        let service = FakeScan::new(Duration::from_secs(60), false);
        let scanner = TransactionScanner::new(service, Duration::from_secs(15));

        let mut handle = scanner.scan_transactions_async("solana:devnet", &[1u8; 32], &[vec![1]], "");
        assert!(matches!(handle.settled().await, ScanState::Failed(msg) if msg.contains("timed out")));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels_the_scan() {
        let service = FakeScan::new(Duration::from_secs(10), false);
        let scanner = TransactionScanner::new(service.clone(), Duration::from_secs(15));

        let handle = scanner.scan_transactions_async("solana:devnet", &[1u8; 32], &[vec![1]], "");
        tokio::task::yield_now().await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!service.finished.load(Ordering::SeqCst));
    }
}
