// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sequential submission of signed transactions.
//!
//! Transactions are sent one at a time, in order. When the dapp asks for it,
//! each transaction must reach the requested commitment before the next one
//! is sent. Failures are per transaction: a failed send or confirmation marks
//! that entry invalid and submission carries on with the rest.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::client::{RpcClientError, RpcTransport};
use super::types::{commitment_ordinal, Commitment, SendTransactionConfig};

// =============================================================================
// Constants
// =============================================================================

/// Overall budget for one confirmation wait.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(20);
/// Poll delay grows linearly: base, 2x base, 3x base ...
pub const CONFIRMATION_BACKOFF: Duration = Duration::from_millis(500);

// =============================================================================
// Options and Errors
// =============================================================================

/// Dapp-supplied submission options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub min_context_slot: Option<u64>,
    /// Used for preflight and, when waiting, for confirmation.
    pub commitment: Commitment,
    pub skip_preflight: Option<bool>,
    pub max_retries: Option<u64>,
    /// Confirm each transaction before sending the next.
    pub wait_for_confirmation: bool,
}

impl SendOptions {
    fn rpc_config(&self) -> SendTransactionConfig {
        SendTransactionConfig {
            preflight_commitment: self.commitment,
            min_context_slot: self.min_context_slot,
            skip_preflight: self.skip_preflight,
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// `valid[i]` is false for every transaction that was not submitted or
    /// not confirmed.
    #[error("{} of {} transactions were not submitted", .valid.iter().filter(|ok| !**ok).count(), .valid.len())]
    InvalidTransactions { valid: Vec<bool> },
}

/// Polling parameters for confirmation.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: CONFIRMATION_TIMEOUT,
            backoff: CONFIRMATION_BACKOFF,
        }
    }
}

// =============================================================================
// TransactionSubmitter
// =============================================================================

pub struct TransactionSubmitter {
    rpc: Arc<dyn RpcTransport>,
    policy: ConfirmationPolicy,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn RpcTransport>) -> Self {
        Self::with_policy(rpc, ConfirmationPolicy::default())
    }

    pub fn with_policy(rpc: Arc<dyn RpcTransport>, policy: ConfirmationPolicy) -> Self {
        Self { rpc, policy }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit signed transactions in order.
    ///
    /// # Returns
    /// * `Ok(signatures)` - One RPC-returned signature per transaction
    /// * `Err(SubmitError::InvalidTransactions)` - If any transaction failed
    pub async fn submit(
        &self,
        transactions: &[Vec<u8>],
        options: &SendOptions,
    ) -> Result<Vec<String>, SubmitError> {
        let config = options.rpc_config();
        let mut signatures: Vec<Option<String>> = Vec::with_capacity(transactions.len());

        for (index, transaction) in transactions.iter().enumerate() {
            let encoded = Base64::encode_string(transaction);
            let signature = match self.rpc.send_transaction(&encoded, &config).await {
                Ok(signature) => Some(signature),
                Err(e) => {
                    warn!(index, error = %e, "Failed sending transaction");
                    None
                }
            };

            let signature = match signature {
                Some(signature) if options.wait_for_confirmation => {
                    match self
                        .confirm_transactions(std::slice::from_ref(&signature), options.commitment)
                        .await
                    {
                        Ok(true) => Some(signature),
                        Ok(false) => {
                            warn!(index, %signature, commitment = %options.commitment, "Transaction not confirmed in time");
                            None
                        }
                        Err(e) => {
                            warn!(index, %signature, error = %e, "Failed confirming transaction");
                            None
                        }
                    }
                }
                other => other,
            };
            signatures.push(signature);
        }

        let valid: Vec<bool> = signatures.iter().map(Option::is_some).collect();
        if valid.iter().all(|ok| *ok) {
            info!(count = signatures.len(), "Submitted all transactions");
            Ok(signatures.into_iter().flatten().collect())
        } else {
            warn!(?valid, "Some transactions were not submitted");
            Err(SubmitError::InvalidTransactions { valid })
        }
    }

    // =========================================================================
    // Confirmation
    // =========================================================================

    /// Poll until every signature reaches `commitment`.
    ///
    /// Returns `Ok(false)` if the confirmation window elapses first. Missing
    /// or unrecognized statuses count as below `processed`.
    pub async fn confirm_transactions(
        &self,
        signatures: &[String],
        commitment: Commitment,
    ) -> Result<bool, RpcClientError> {
        let required = commitment.ordinal();
        let poll = async {
            let mut attempt: u32 = 0;
            loop {
                let statuses = self.rpc.get_signature_statuses(signatures).await?;
                let confirmed = signatures.len() == statuses.value.len()
                    && statuses.value.iter().all(|status| {
                        let reported = status
                            .as_ref()
                            .and_then(|s| s.confirmation_status.as_deref());
                        commitment_ordinal(reported) >= required
                    });
                if confirmed {
                    debug!(attempt, %commitment, "Transactions confirmed");
                    return Ok::<_, RpcClientError>(true);
                }
                attempt += 1;
                sleep(self.policy.backoff * attempt).await;
            }
        };

        match timeout(self.policy.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::{SignatureStatus, SignatureStatusesResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scripted RPC node recording every call in order.
    #[derive(Default)]
    struct ScriptedRpc {
        /// Per send call: `Some(sig)` succeeds, `None` fails.
        sends: Mutex<VecDeque<Option<String>>>,
        /// Per status call: reported confirmation status (applied to all).
        statuses: Mutex<VecDeque<Option<&'static str>>>,
        /// Fallback status once the script runs out.
        steady_status: Option<&'static str>,
        log: Mutex<Vec<String>>,
        status_times: Mutex<Vec<Instant>>,
        sent_configs: Mutex<Vec<SendTransactionConfig>>,
    }

    impl ScriptedRpc {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedRpc {
        async fn send_transaction(
            &self,
            transaction_base64: &str,
            config: &SendTransactionConfig,
        ) -> Result<String, RpcClientError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("send:{transaction_base64}"));
            self.sent_configs.lock().unwrap().push(config.clone());
            match self.sends.lock().unwrap().pop_front().flatten() {
                Some(signature) => Ok(signature),
                None => Err(RpcClientError::Rpc {
                    code: -32002,
                    message: "simulation failed".into(),
                }),
            }
        }

        async fn get_signature_statuses(
            &self,
            signatures: &[String],
        ) -> Result<SignatureStatusesResponse, RpcClientError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("status:{}", signatures.join(",")));
            self.status_times.lock().unwrap().push(Instant::now());
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.steady_status);
            Ok(SignatureStatusesResponse {
                context: None,
                value: signatures
                    .iter()
                    .map(|_| {
                        status.map(|s| SignatureStatus {
                            slot: 1,
                            confirmations: None,
                            err: None,
                            confirmation_status: Some(s.to_string()),
                        })
                    })
                    .collect(),
            })
        }
    }

    fn submitter(rpc: Arc<ScriptedRpc>) -> TransactionSubmitter {
        TransactionSubmitter::new(rpc)
    }

    fn txs(n: u8) -> Vec<Vec<u8>> {
        (1..=n).map(|i| vec![i; 3]).collect()
    }

    #[tokio::test]
    async fn submits_in_order_without_waiting() {
        let rpc = Arc::new(ScriptedRpc {
            sends: Mutex::new(VecDeque::from([Some("a".into()), Some("b".into())])),
            ..Default::default()
        });

        let signatures = submitter(rpc.clone())
            .submit(&txs(2), &SendOptions::default())
            .await
            .unwrap();

        assert_eq!(signatures, vec!["a", "b"]);
        assert_eq!(rpc.log(), vec!["send:AQEB", "send:AgIC"]);
        let configs = rpc.sent_configs.lock().unwrap();
        assert_eq!(configs[0].preflight_commitment, Commitment::Processed);
        assert_eq!(configs[0].encoding, "base64");
    }

    #[tokio::test]
    async fn failed_send_marks_only_that_entry_invalid() {
        let rpc = Arc::new(ScriptedRpc {
            sends: Mutex::new(VecDeque::from([Some("a".into()), None, Some("c".into())])),
            ..Default::default()
        });

        let err = submitter(rpc.clone())
            .submit(&txs(3), &SendOptions::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SubmitError::InvalidTransactions {
                valid: vec![true, false, true]
            }
        );
        // The third transaction was still attempted.
        assert_eq!(rpc.log().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_each_confirmation_before_next_send() {
        let rpc = Arc::new(ScriptedRpc {
            sends: Mutex::new(VecDeque::from([Some("a".into()), Some("b".into())])),
            statuses: Mutex::new(VecDeque::from([Some("processed"), Some("confirmed")])),
            steady_status: Some("confirmed"),
            ..Default::default()
        });
        let options = SendOptions {
            commitment: Commitment::Confirmed,
            wait_for_confirmation: true,
            ..Default::default()
        };

        let signatures = submitter(rpc.clone())
            .submit(&txs(2), &options)
            .await
            .unwrap();

        assert_eq!(signatures, vec!["a", "b"]);
        assert_eq!(
            rpc.log(),
            vec!["send:AQEB", "status:a", "status:a", "send:AgIC", "status:b"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_transaction_is_invalid() {
        let rpc = Arc::new(ScriptedRpc {
            sends: Mutex::new(VecDeque::from([Some("a".into()), Some("b".into())])),
            statuses: Mutex::new(VecDeque::new()),
            steady_status: Some("processed"),
            ..Default::default()
        });
        let options = SendOptions {
            commitment: Commitment::Finalized,
            wait_for_confirmation: true,
            ..Default::default()
        };

        let err = submitter(rpc)
            .submit(&txs(2), &options)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SubmitError::InvalidTransactions {
                valid: vec![false, false]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_linearly() {
        let rpc = Arc::new(ScriptedRpc {
            statuses: Mutex::new(VecDeque::from([
                Some("processed"),
                Some("processed"),
                Some("processed"),
                Some("finalized"),
            ])),
            ..Default::default()
        });

        let confirmed = submitter(rpc.clone())
            .confirm_transactions(&["a".to_string()], Commitment::Confirmed)
            .await
            .unwrap();
        assert!(confirmed);

        let times = rpc.status_times.lock().unwrap().clone();
        assert_eq!(times.len(), 4);
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(500));
        assert!(gaps[1] >= Duration::from_millis(1000));
        assert!(gaps[2] >= Duration::from_millis(1500));
        assert!(gaps[0] < gaps[1] && gaps[1] < gaps[2]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_times_out_as_unconfirmed() {
        let rpc = Arc::new(ScriptedRpc {
            steady_status: Some("rooted"),
            ..Default::default()
        });

        let started = Instant::now();
        let confirmed = submitter(rpc)
            .confirm_transactions(&["a".to_string()], Commitment::Processed)
            .await
            .unwrap();

        assert!(!confirmed);
        assert!(started.elapsed() >= CONFIRMATION_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_status_is_not_confirmed() {
        let rpc = Arc::new(ScriptedRpc {
            statuses: Mutex::new(VecDeque::from([None, Some("processed")])),
            ..Default::default()
        });

        let confirmed = submitter(rpc.clone())
            .confirm_transactions(&["a".to_string()], Commitment::Processed)
            .await
            .unwrap();
        assert!(confirmed);
        assert_eq!(rpc.status_times.lock().unwrap().len(), 2);
    }
}
