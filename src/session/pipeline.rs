// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The session request pipeline.
//!
//! One request is handled at a time. Each request is presented to the user,
//! waits for an explicit decision, unlocks the device key if needed, and then
//! signs and optionally submits. A new inbound request, a closed inbound
//! channel or shutdown abandons whatever is in flight: its reply channel is
//! dropped without a value and network calls already issued are not undone.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::events::{RequestId, SessionState, UiEvent, UserDecision};
use super::request::{
    AuthorizeRequest, InboundRequest, RequestKind, RequestOutcome, SessionRequest,
    SignAndSendRequest, SignInRequest, SignPayloadsRequest, DEFAULT_ACCOUNT_LABEL,
};
use crate::blockchain::{
    sign_message, sign_transaction, Cluster, Ed25519Keypair, SigningResult, SubmitError,
    TransactionSubmitter,
};
use crate::crypto::{AuthGate, AuthenticationError};
use crate::error::WalletError;
use crate::scanner::{ScanHandle, TransactionScanner};
use crate::storage::{KeyStore, KeyStoreError};

// =============================================================================
// Services
// =============================================================================

/// Ceremonies attempted for one approval when the key locks again before use.
pub const MAX_AUTH_ATTEMPTS: u32 = 3;

/// Process-wide services the pipeline borrows.
#[derive(Clone)]
pub struct SessionServices {
    pub key_store: Arc<KeyStore>,
    pub auth_gate: Arc<AuthGate>,
    pub scanner: Arc<TransactionScanner>,
    pub submitter: Arc<TransactionSubmitter>,
}

// =============================================================================
// Internal Types
// =============================================================================

/// How an approved request finds its keypair.
#[derive(Debug, Clone, Copy)]
enum KeyLookup<'a> {
    /// The key the dapp was previously authorized for.
    Authorized(&'a [u8; 32]),
    /// The wallet's account, created on first use.
    ExistingOrGenerate,
}

enum ExecuteError {
    /// The ceremony failed; present the request again.
    Authentication(AuthenticationError),
    Fatal(WalletError),
}

impl From<WalletError> for ExecuteError {
    fn from(e: WalletError) -> Self {
        Self::Fatal(e)
    }
}

/// What interrupted the wait on an in-flight request.
enum Step {
    Done(RequestOutcome),
    Replaced(InboundRequest),
    Teardown(&'static str),
}

// =============================================================================
// SessionPipeline
// =============================================================================

pub struct SessionPipeline {
    services: SessionServices,
    ui: mpsc::Sender<UiEvent>,
    state: watch::Sender<SessionState>,
}

impl SessionPipeline {
    pub fn new(
        services: SessionServices,
        ui: mpsc::Sender<UiEvent>,
    ) -> (Self, watch::Receiver<SessionState>) {
        let (state, observer) = watch::channel(SessionState::Idle);
        (
            Self {
                services,
                ui,
                state,
            },
            observer,
        )
    }

    // =========================================================================
    // Session Loop
    // =========================================================================

    /// Drive the session until shutdown or until the inbound channel closes.
    ///
    /// # Arguments
    /// * `inbound` - Requests from the dapp transport, each with a reply channel
    /// * `decisions` - Approve/decline answers from the UI
    /// * `shutdown` - Cancels the session, abandoning any in-flight request
    pub async fn run(
        self,
        mut inbound: mpsc::Receiver<InboundRequest>,
        mut decisions: mpsc::Receiver<UserDecision>,
        shutdown: CancellationToken,
    ) {
        info!("Session pipeline started");
        let mut pending: Option<InboundRequest> = None;

        loop {
            let next = match pending.take() {
                Some(next) => next,
                None => tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    received = inbound.recv() => match received {
                        Some(next) => next,
                        None => break,
                    },
                },
            };

            let InboundRequest { request, reply } = next;
            let request_id = Uuid::new_v4();
            let kind = request.kind();
            info!(
                %request_id,
                %kind,
                dapp = %request.identity().display_name(),
                chain = %request.chain(),
                "Received request"
            );

            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Step::Teardown("shutdown"),
                received = inbound.recv() => match received {
                    Some(next) => Step::Replaced(next),
                    None => Step::Teardown("inbound channel closed"),
                },
                outcome = self.process(request_id, &request, &mut decisions) => Step::Done(outcome),
            };

            match step {
                Step::Done(outcome) => {
                    self.set_state(SessionState::Complete(kind));
                    if reply.send(outcome).is_err() {
                        debug!(%request_id, "Session closed before the outcome was delivered");
                    }
                    self.set_state(SessionState::Idle);
                    self.emit(UiEvent::Dismissed { request_id }).await;
                }
                Step::Replaced(next) => {
                    warn!(%request_id, %kind, "New request arrived, abandoning the current one");
                    drop(reply);
                    self.abandon(request_id).await;
                    pending = Some(next);
                }
                Step::Teardown(reason) => {
                    warn!(%request_id, %kind, reason, "Session torn down, abandoning request");
                    drop(reply);
                    self.abandon(request_id).await;
                    break;
                }
            }
        }

        self.set_state(SessionState::Idle);
        info!("Session pipeline stopped");
    }

    async fn abandon(&self, request_id: RequestId) {
        self.set_state(SessionState::Idle);
        self.emit(UiEvent::Dismissed { request_id }).await;
    }

    async fn process(
        &self,
        request_id: RequestId,
        request: &SessionRequest,
        decisions: &mut mpsc::Receiver<UserDecision>,
    ) -> RequestOutcome {
        let kind = request.kind();

        if matches!(
            request,
            SessionRequest::AuthorizeDapp(_) | SessionRequest::SignIn(_)
        ) && Cluster::from_chain_identifier(request.chain()).is_none()
        {
            warn!(%request_id, chain = %request.chain(), "Rejecting request for unsupported chain");
            return RequestOutcome::failed(&WalletError::InvalidChain(request.chain().to_string()));
        }

        let mut scan: Option<ScanHandle> = None;
        loop {
            self.set_state(SessionState::AwaitingApproval(kind));
            self.emit(UiEvent::Present {
                request_id,
                request: request.clone(),
            })
            .await;

            if scan.is_none() {
                if let SessionRequest::SignTransactions(inner) = request {
                    scan = Some(self.start_scan(request_id, inner));
                }
            }

            if !self.await_decision(request_id, decisions).await {
                self.set_state(SessionState::Declined(kind));
                info!(%request_id, %kind, "Request declined");
                return RequestOutcome::Declined;
            }
            self.set_state(SessionState::Approved(kind));
            info!(%request_id, %kind, "Request approved");

            match self.execute(request).await {
                Ok(outcome) => return outcome,
                Err(ExecuteError::Authentication(e)) => {
                    warn!(%request_id, error = %e, "Authentication failed, presenting request again");
                    self.emit(UiEvent::AuthenticationFailed {
                        request_id,
                        reason: e.to_string(),
                    })
                    .await;
                }
                Err(ExecuteError::Fatal(e)) => {
                    error!(%request_id, %kind, code = e.error_code(), error = %e, "Request failed");
                    return RequestOutcome::failed(&e);
                }
            }
        }
    }

    /// Wait for the user's answer to `request_id`. A closed decision channel
    /// counts as a decline.
    async fn await_decision(
        &self,
        request_id: RequestId,
        decisions: &mut mpsc::Receiver<UserDecision>,
    ) -> bool {
        loop {
            match decisions.recv().await {
                Some(decision) if decision.request_id == request_id => return decision.approved,
                Some(decision) => {
                    debug!(
                        expected = %request_id,
                        received = %decision.request_id,
                        "Ignoring decision for another request"
                    );
                }
                None => {
                    warn!(%request_id, "Decision channel closed, treating request as declined");
                    return false;
                }
            }
        }
    }

    /// Scan in the background and forward every state change to the UI.
    fn start_scan(&self, request_id: RequestId, request: &SignPayloadsRequest) -> ScanHandle {
        let handle = self.services.scanner.scan_transactions_async(
            &request.chain,
            &request.authorized_public_key,
            &request.payloads,
            &request.identity.origin(),
        );

        let mut updates = handle.subscribe();
        let ui = self.ui.clone();
        tokio::spawn(async move {
            loop {
                let state = updates.borrow_and_update().clone();
                let terminal = state.is_terminal();
                if ui
                    .send(UiEvent::ScanUpdated { request_id, state })
                    .await
                    .is_err()
                    || terminal
                {
                    break;
                }
                if updates.changed().await.is_err() {
                    break;
                }
            }
        });
        handle
    }

    // =========================================================================
    // Request Handlers
    // =========================================================================

    async fn execute(&self, request: &SessionRequest) -> Result<RequestOutcome, ExecuteError> {
        match request {
            SessionRequest::AuthorizeDapp(inner) => self.authorize(inner).await,
            SessionRequest::SignIn(inner) => self.sign_in(inner).await,
            SessionRequest::SignMessages(inner) => self.sign_messages(inner).await,
            SessionRequest::SignTransactions(inner) => self.sign_transactions(inner).await,
            SessionRequest::SignAndSendTransactions(inner) => self.sign_and_send(inner).await,
        }
    }

    async fn authorize(&self, request: &AuthorizeRequest) -> Result<RequestOutcome, ExecuteError> {
        let keypair = self.account_keypair().await?;
        info!(chain = %request.chain, public_key = %keypair.public_key_base58(), "Dapp authorized");
        Ok(RequestOutcome::Authorized {
            public_key: keypair.public_key(),
            account_label: Some(DEFAULT_ACCOUNT_LABEL.to_string()),
        })
    }

    async fn sign_in(&self, request: &SignInRequest) -> Result<RequestOutcome, ExecuteError> {
        let keypair = self.account_keypair().await?;
        self.set_state(SessionState::Signing(RequestKind::SignIn));

        let message = request
            .payload
            .resolved(&request.identity, &request.chain)
            .prepare_message(&keypair.public_key_base58());
        let SigningResult { signature, .. } = sign_message(message.as_bytes(), &keypair);

        Ok(RequestOutcome::SignedIn {
            public_key: keypair.public_key(),
            account_label: Some(DEFAULT_ACCOUNT_LABEL.to_string()),
            signed_message: message.into_bytes(),
            signature,
        })
    }

    async fn sign_messages(
        &self,
        request: &SignPayloadsRequest,
    ) -> Result<RequestOutcome, ExecuteError> {
        let Some(keypair) = self
            .load_keypair(KeyLookup::Authorized(&request.authorized_public_key))
            .await?
        else {
            return Ok(RequestOutcome::AuthorizationNotValid);
        };
        self.set_state(SessionState::Signing(RequestKind::SignMessages));

        let payloads = request
            .payloads
            .iter()
            .map(|message| sign_message(message, &keypair).signed_payload)
            .collect();
        debug!(count = request.payloads.len(), "Signed messages");
        Ok(RequestOutcome::SignedPayloads { payloads })
    }

    async fn sign_transactions(
        &self,
        request: &SignPayloadsRequest,
    ) -> Result<RequestOutcome, ExecuteError> {
        let Some(keypair) = self
            .load_keypair(KeyLookup::Authorized(&request.authorized_public_key))
            .await?
        else {
            return Ok(RequestOutcome::AuthorizationNotValid);
        };
        self.set_state(SessionState::Signing(RequestKind::SignTransactions));

        Ok(match sign_all(&request.payloads, &keypair) {
            Ok(signed) => RequestOutcome::SignedPayloads {
                payloads: signed.into_iter().map(|r| r.signed_payload).collect(),
            },
            Err(valid) => RequestOutcome::InvalidPayloads { valid },
        })
    }

    async fn sign_and_send(
        &self,
        request: &SignAndSendRequest,
    ) -> Result<RequestOutcome, ExecuteError> {
        let Some(keypair) = self
            .load_keypair(KeyLookup::Authorized(&request.authorized_public_key))
            .await?
        else {
            return Ok(RequestOutcome::AuthorizationNotValid);
        };
        self.set_state(SessionState::Signing(RequestKind::SignAndSendTransactions));

        let signed = match sign_all(&request.payloads, &keypair) {
            Ok(signed) => signed,
            Err(valid) => return Ok(RequestOutcome::InvalidPayloads { valid }),
        };

        self.set_state(SessionState::Submitting);
        let options = request.options.to_send_options();
        let transactions: Vec<Vec<u8>> = signed.iter().map(|r| r.signed_payload.clone()).collect();
        match self.services.submitter.submit(&transactions, &options).await {
            Ok(rpc_signatures) => {
                info!(count = rpc_signatures.len(), "Transactions submitted");
                Ok(RequestOutcome::Sent {
                    signatures: signed.iter().map(|r| r.signature).collect(),
                })
            }
            Err(SubmitError::InvalidTransactions { valid }) => {
                Ok(RequestOutcome::NotSubmitted { valid })
            }
        }
    }

    // =========================================================================
    // Key Access
    // =========================================================================

    async fn account_keypair(&self) -> Result<Ed25519Keypair, ExecuteError> {
        self.load_keypair(KeyLookup::ExistingOrGenerate)
            .await?
            .ok_or_else(|| {
                ExecuteError::Fatal(WalletError::Storage("no keypair after generation".into()))
            })
    }

    /// Unlock the device key and look up a keypair. Ceremony failures are
    /// returned for re-presentation; a key that locks again between the
    /// ceremony and its use is retried up to [`MAX_AUTH_ATTEMPTS`] times.
    async fn load_keypair(
        &self,
        lookup: KeyLookup<'_>,
    ) -> Result<Option<Ed25519Keypair>, ExecuteError> {
        for attempt in 1..=MAX_AUTH_ATTEMPTS {
            self.services
                .auth_gate
                .ensure_unlocked()
                .await
                .map_err(ExecuteError::Authentication)?;

            match self.lookup(lookup).await {
                Ok(keypair) => return Ok(keypair),
                Err(e) if e.is_authentication_required() => {
                    warn!(attempt, "Device key locked before use");
                }
                Err(e) => return Err(WalletError::from(e).into()),
            }
        }
        Err(WalletError::AuthenticationRequired.into())
    }

    async fn lookup(&self, lookup: KeyLookup<'_>) -> Result<Option<Ed25519Keypair>, KeyStoreError> {
        let store = &self.services.key_store;
        match lookup {
            KeyLookup::Authorized(public_key) => store.get_keypair(public_key).await,
            KeyLookup::ExistingOrGenerate => match store.get_existing_keypair().await? {
                Some(keypair) => Ok(Some(keypair)),
                None => {
                    info!("No account yet, generating a keypair");
                    store.generate_keypair().await.map(Some)
                }
            },
        }
    }

    // =========================================================================
    // State and UI
    // =========================================================================

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    async fn emit(&self, event: UiEvent) {
        if self.ui.send(event).await.is_err() {
            debug!("UI receiver dropped, event discarded");
        }
    }
}

// =============================================================================
// Signing Helpers
// =============================================================================

/// Sign every transaction. On any failure, returns which ones signed.
fn sign_all(
    payloads: &[Vec<u8>],
    keypair: &Ed25519Keypair,
) -> Result<Vec<SigningResult>, Vec<bool>> {
    let results: Vec<_> = payloads
        .iter()
        .enumerate()
        .map(|(index, payload)| {
            sign_transaction(payload, keypair).inspect_err(|e| {
                warn!(index, error = %e, "Could not sign transaction");
            })
        })
        .collect();

    if results.iter().all(Result::is_ok) {
        Ok(results.into_iter().flatten().collect())
    } else {
        Err(results.iter().map(Result::is_ok).collect())
    }
}
