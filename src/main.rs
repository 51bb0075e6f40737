// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Headless session harness.
//!
//! Reads one JSON request per stdin line, runs it through the session
//! pipeline and prints each outcome as one JSON line on stdout. Logs go to
//! stderr.

use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mwallet_signer::blockchain::{SolanaRpcClient, TransactionSubmitter};
use mwallet_signer::config::Config;
use mwallet_signer::crypto::{
    AuthCeremony, AuthGate, AuthMethod, AuthPrompt, AuthenticationError, Authenticator,
    EncryptionService, SoftwareDeviceKey,
};
use mwallet_signer::error::WalletError;
use mwallet_signer::logging::init_tracing;
use mwallet_signer::providers::RiskScanClient;
use mwallet_signer::scanner::TransactionScanner;
use mwallet_signer::session::{
    InboundRequest, RequestOutcome, SessionPipeline, SessionRequest, SessionServices, UiEvent,
    UserDecision,
};
use mwallet_signer::storage::{KeyDatabase, KeyStore, StoragePaths};

/// Stands in for the device's credential sheet: every prompt succeeds.
struct ConsoleAuthenticator;

#[async_trait]
impl Authenticator for ConsoleAuthenticator {
    async fn authenticate(&self, prompt: &AuthPrompt) -> Result<AuthCeremony, AuthenticationError> {
        info!(title = %prompt.title, "Granting device credential authentication");
        Ok(AuthCeremony::completed(AuthMethod::DeviceCredential))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);
    info!(
        cluster = %config.network.cluster,
        rpc_url = %config.rpc_url,
        data_dir = %config.data_dir.display(),
        "Starting mwallet-signer"
    );

    let paths = StoragePaths::new(&config.data_dir);
    let device_key = Arc::new(SoftwareDeviceKey::load_or_create(
        paths.device_key(),
        config.auth_validity,
    )?);
    let key_db = Arc::new(KeyDatabase::open(&paths.keys_db())?);
    let key_store = Arc::new(KeyStore::new(key_db, EncryptionService::new(device_key.clone())));

    if config.risk_scan_api_key.is_empty() {
        warn!("RISK_SCAN_API_KEY is not set, scans will be rejected");
    }
    let services = SessionServices {
        key_store,
        auth_gate: Arc::new(AuthGate::new(device_key, Arc::new(ConsoleAuthenticator))),
        scanner: Arc::new(TransactionScanner::new(
            Arc::new(RiskScanClient::new(
                &config.risk_scan_base_url,
                &config.risk_scan_api_key,
            )?),
            config.scan_timeout,
        )),
        submitter: Arc::new(TransactionSubmitter::new(Arc::new(SolanaRpcClient::new(
            &config.rpc_url,
        )?))),
    };

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, shutting down");
            }
            shutdown.cancel();
        }
    });

    let (ui_tx, ui_rx) = mpsc::channel(32);
    let (decisions_tx, decisions_rx) = mpsc::channel(8);
    let (inbound_tx, inbound_rx) = mpsc::channel(1);
    let (pipeline, _state) = SessionPipeline::new(services, ui_tx);
    let session = tokio::spawn(pipeline.run(inbound_rx, decisions_rx, shutdown.clone()));
    tokio::spawn(console_ui(ui_rx, decisions_tx, config.auto_approve));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: SessionRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Could not parse request");
                print_outcome(&RequestOutcome::failed(&WalletError::Parse(e.to_string())))?;
                continue;
            }
        };

        let (inbound, reply) = InboundRequest::new(request);
        if inbound_tx.send(inbound).await.is_err() {
            break;
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            outcome = reply => match outcome {
                Ok(outcome) => print_outcome(&outcome)?,
                Err(_) => warn!("Request abandoned without an outcome"),
            },
        }
    }

    drop(inbound_tx);
    session.await?;
    info!("mwallet-signer stopped");
    Ok(())
}

/// Answers every presented request with the configured decision.
async fn console_ui(
    mut events: mpsc::Receiver<UiEvent>,
    decisions: mpsc::Sender<UserDecision>,
    auto_approve: bool,
) {
    while let Some(event) = events.recv().await {
        debug!(request_id = %event.request_id(), "UI event");
        match event {
            UiEvent::Present {
                request_id,
                request,
            } => {
                let identity = request.identity();
                info!(
                    %request_id,
                    kind = %request.kind(),
                    dapp = %identity.display_name(),
                    icon = ?identity.icon_url().map(|u| u.to_string()),
                    approve = auto_approve,
                    "Request presented"
                );
                let decision = if auto_approve {
                    UserDecision::approve(request_id)
                } else {
                    UserDecision::decline(request_id)
                };
                if decisions.send(decision).await.is_err() {
                    break;
                }
            }
            UiEvent::ScanUpdated { request_id, state } => {
                info!(%request_id, ?state, "Scan updated");
            }
            UiEvent::AuthenticationFailed { request_id, reason } => {
                warn!(%request_id, %reason, "Authentication failed");
            }
            UiEvent::Dismissed { .. } => {}
        }
    }
}

fn print_outcome(outcome: &RequestOutcome) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string(outcome)?);
    Ok(())
}
