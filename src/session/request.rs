// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Dapp requests and the outcomes reported back to them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::warn;
use url::Url;

use super::encoding::{base58_key, base58_signature, base58_signatures, base64_bytes, base64_list};
use crate::blockchain::{Commitment, SendOptions};

/// Label attached to accounts handed to dapps.
pub const DEFAULT_ACCOUNT_LABEL: &str = "mwallet";

/// Who is asking, as self-reported by the dapp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DappIdentity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uri: Option<Url>,
    #[serde(default)]
    pub icon_relative_uri: Option<String>,
}

impl DappIdentity {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<no name>")
    }

    /// Icon location: the relative icon path appended to the identity URI.
    /// `None` unless the icon path is relative and the identity URI is set.
    pub fn icon_url(&self) -> Option<Url> {
        let base = self.uri.as_ref()?;
        let icon = self.icon_relative_uri.as_deref()?;
        if icon.is_empty() || Url::parse(icon).is_ok() {
            return None;
        }
        let mut url = base.clone();
        let path = format!(
            "{}/{}",
            base.path().trim_end_matches('/'),
            icon.trim_start_matches('/')
        );
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        Some(url)
    }

    /// Origin reported to the risk scanner.
    pub fn origin(&self) -> String {
        self.uri.as_ref().map(Url::to_string).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub identity: DappIdentity,
    pub chain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub identity: DappIdentity,
    pub chain: String,
    #[serde(default)]
    pub payload: SignInPayload,
}

/// Messages or transactions to sign with an already-authorized account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayloadsRequest {
    pub identity: DappIdentity,
    pub chain: String,
    #[serde(with = "base58_key")]
    pub authorized_public_key: [u8; 32],
    #[serde(with = "base64_list")]
    pub payloads: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignAndSendRequest {
    pub identity: DappIdentity,
    pub chain: String,
    #[serde(with = "base58_key")]
    pub authorized_public_key: [u8; 32],
    #[serde(with = "base64_list")]
    pub payloads: Vec<Vec<u8>>,
    #[serde(default)]
    pub options: SendRequestOptions,
}

/// Submission options as the dapp sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestOptions {
    #[serde(default)]
    pub min_context_slot: Option<u64>,
    #[serde(default)]
    pub commitment: Option<String>,
    #[serde(default)]
    pub skip_preflight: Option<bool>,
    #[serde(default)]
    pub max_retries: Option<u64>,
    #[serde(default)]
    pub wait_for_commitment_to_send_next_transaction: Option<bool>,
}

impl SendRequestOptions {
    /// Resolve into submitter options. An unrecognized commitment falls back
    /// to `processed`.
    pub fn to_send_options(&self) -> SendOptions {
        let commitment = match self.commitment.as_deref() {
            None => Commitment::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default commitment");
                Commitment::default()
            }),
        };
        SendOptions {
            min_context_slot: self.min_context_slot,
            commitment,
            skip_preflight: self.skip_preflight,
            max_retries: self.max_retries,
            wait_for_confirmation: self
                .wait_for_commitment_to_send_next_transaction
                .unwrap_or(false),
        }
    }
}

/// Sign-In With Solana payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInPayload {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub statement: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<String>,
    #[serde(default)]
    pub not_before: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl SignInPayload {
    /// Fill fields the dapp left out from its identity and chain.
    pub fn resolved(&self, identity: &DappIdentity, chain: &str) -> Self {
        let mut payload = self.clone();
        if payload.domain.is_none() {
            payload.domain = identity
                .uri
                .as_ref()
                .and_then(|u| u.host_str().map(str::to_string));
        }
        if payload.uri.is_none() {
            payload.uri = identity.uri.as_ref().map(Url::to_string);
        }
        if payload.chain_id.is_none() && !chain.is_empty() {
            payload.chain_id = Some(chain.to_string());
        }
        payload
    }

    /// The human-readable message the account signs.
    pub fn prepare_message(&self, address: &str) -> String {
        let mut message = format!(
            "{} wants you to sign in with your Solana account:\n{address}",
            self.domain.as_deref().unwrap_or_default()
        );
        if let Some(statement) = &self.statement {
            message.push_str("\n\n");
            message.push_str(statement);
        }

        let fields = [
            ("URI", &self.uri),
            ("Version", &self.version),
            ("Chain ID", &self.chain_id),
            ("Nonce", &self.nonce),
            ("Issued At", &self.issued_at),
            ("Expiration Time", &self.expiration_time),
            ("Not Before", &self.not_before),
            ("Request ID", &self.request_id),
        ];
        let mut advanced = Vec::new();
        for (label, value) in fields {
            if let Some(value) = value {
                advanced.push(format!("{label}: {value}"));
            }
        }
        if !self.resources.is_empty() {
            advanced.push("Resources:".to_string());
            advanced.extend(self.resources.iter().map(|r| format!("- {r}")));
        }
        if !advanced.is_empty() {
            message.push_str("\n\n");
            message.push_str(&advanced.join("\n"));
        }
        message
    }
}

/// A request forwarded by the dapp transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionRequest {
    AuthorizeDapp(AuthorizeRequest),
    SignIn(SignInRequest),
    SignMessages(SignPayloadsRequest),
    SignTransactions(SignPayloadsRequest),
    SignAndSendTransactions(SignAndSendRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    AuthorizeDapp,
    SignIn,
    SignMessages,
    SignTransactions,
    SignAndSendTransactions,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AuthorizeDapp => "authorize_dapp",
            Self::SignIn => "sign_in",
            Self::SignMessages => "sign_messages",
            Self::SignTransactions => "sign_transactions",
            Self::SignAndSendTransactions => "sign_and_send_transactions",
        })
    }
}

impl SessionRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::AuthorizeDapp(_) => RequestKind::AuthorizeDapp,
            Self::SignIn(_) => RequestKind::SignIn,
            Self::SignMessages(_) => RequestKind::SignMessages,
            Self::SignTransactions(_) => RequestKind::SignTransactions,
            Self::SignAndSendTransactions(_) => RequestKind::SignAndSendTransactions,
        }
    }

    pub fn identity(&self) -> &DappIdentity {
        match self {
            Self::AuthorizeDapp(r) => &r.identity,
            Self::SignIn(r) => &r.identity,
            Self::SignMessages(r) | Self::SignTransactions(r) => &r.identity,
            Self::SignAndSendTransactions(r) => &r.identity,
        }
    }

    pub fn chain(&self) -> &str {
        match self {
            Self::AuthorizeDapp(r) => &r.chain,
            Self::SignIn(r) => &r.chain,
            Self::SignMessages(r) | Self::SignTransactions(r) => &r.chain,
            Self::SignAndSendTransactions(r) => &r.chain,
        }
    }
}

/// Terminal result of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Authorized {
        #[serde(with = "base58_key")]
        public_key: [u8; 32],
        account_label: Option<String>,
    },
    SignedIn {
        #[serde(with = "base58_key")]
        public_key: [u8; 32],
        account_label: Option<String>,
        #[serde(with = "base64_bytes")]
        signed_message: Vec<u8>,
        #[serde(with = "base58_signature")]
        signature: [u8; 64],
    },
    SignedPayloads {
        #[serde(with = "base64_list")]
        payloads: Vec<Vec<u8>>,
    },
    /// Some payloads could not be signed; nothing was returned.
    InvalidPayloads { valid: Vec<bool> },
    Sent {
        #[serde(with = "base58_signatures")]
        signatures: Vec<[u8; 64]>,
    },
    /// Some transactions were not submitted or not confirmed.
    NotSubmitted { valid: Vec<bool> },
    AuthorizationNotValid,
    Declined,
    Failed { code: String, message: String },
}

impl RequestOutcome {
    pub fn failed(error: &crate::error::WalletError) -> Self {
        Self::Failed {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// A request paired with the channel its outcome is delivered on. Dropping
/// the sender without replying signals abandonment.
#[derive(Debug)]
pub struct InboundRequest {
    pub request: SessionRequest,
    pub reply: oneshot::Sender<RequestOutcome>,
}

impl InboundRequest {
    pub fn new(request: SessionRequest) -> (Self, oneshot::Receiver<RequestOutcome>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(uri: &str, icon: Option<&str>) -> DappIdentity {
        DappIdentity {
            name: Some("Example".into()),
            uri: Some(uri.parse().unwrap()),
            icon_relative_uri: icon.map(str::to_string),
        }
    }

    #[test]
    fn icon_is_appended_to_identity_uri() {
        let id = identity("https://dapp.example/app", Some("favicon.ico"));
        assert_eq!(
            id.icon_url().unwrap().as_str(),
            "https://dapp.example/app/favicon.ico"
        );

        let id = identity("https://dapp.example", Some("/img/icon.png"));
        assert_eq!(
            id.icon_url().unwrap().as_str(),
            "https://dapp.example/img/icon.png"
        );
    }

    #[test]
    fn absolute_icon_is_ignored() {
        let id = identity("https://dapp.example", Some("https://evil.example/icon.png"));
        assert!(id.icon_url().is_none());
        assert!(DappIdentity::default().icon_url().is_none());
        assert_eq!(DappIdentity::default().display_name(), "<no name>");
    }

    #[test]
    fn send_options_resolve_commitment() {
        let options = SendRequestOptions {
            commitment: Some("finalized".into()),
            wait_for_commitment_to_send_next_transaction: Some(true),
            ..Default::default()
        }
        .to_send_options();
        assert_eq!(options.commitment, Commitment::Finalized);
        assert!(options.wait_for_confirmation);

        let fallback = SendRequestOptions {
            commitment: Some("max".into()),
            ..Default::default()
        }
        .to_send_options();
        assert_eq!(fallback.commitment, Commitment::Processed);
        assert!(!fallback.wait_for_confirmation);
    }

    #[test]
    fn sign_in_message_includes_present_fields() {
        let payload = SignInPayload {
            statement: Some("Welcome back".into()),
            nonce: Some("abc123".into()),
            resources: vec!["https://dapp.example/terms".into()],
            ..Default::default()
        }
        .resolved(&identity("https://dapp.example", None), "solana:devnet");

        let message = payload.prepare_message("Wallet1111");
        assert_eq!(
            message,
            "dapp.example wants you to sign in with your Solana account:\n\
             Wallet1111\n\
             \n\
             Welcome back\n\
             \n\
             URI: https://dapp.example/\n\
             Chain ID: solana:devnet\n\
             Nonce: abc123\n\
             Resources:\n\
             - https://dapp.example/terms"
        );
    }

    #[test]
    fn minimal_sign_in_message() {
        let payload = SignInPayload {
            domain: Some("dapp.example".into()),
            ..Default::default()
        };
        assert_eq!(
            payload.prepare_message("Wallet1111"),
            "dapp.example wants you to sign in with your Solana account:\nWallet1111"
        );
    }

    #[test]
    fn requests_parse_from_tagged_json() {
        let request: SessionRequest = serde_json::from_value(json!({
            "type": "sign_and_send_transactions",
            "identity": { "name": "Example", "uri": "https://dapp.example" },
            "chain": "solana:devnet",
            "authorizedPublicKey": "11111111111111111111111111111111",
            "payloads": ["AQID"],
            "options": { "commitment": "confirmed", "minContextSlot": 5 }
        }))
        .unwrap();

        assert_eq!(request.kind(), RequestKind::SignAndSendTransactions);
        assert_eq!(request.chain(), "solana:devnet");
        let SessionRequest::SignAndSendTransactions(inner) = request else {
            panic!("wrong variant");
        };
        assert_eq!(inner.authorized_public_key, [0u8; 32]);
        assert_eq!(inner.payloads, vec![vec![1, 2, 3]]);
        assert_eq!(inner.options.min_context_slot, Some(5));
    }

    #[test]
    fn outcomes_serialize_with_tag() {
        let json = serde_json::to_value(RequestOutcome::NotSubmitted {
            valid: vec![true, false],
        })
        .unwrap();
        assert_eq!(json, json!({ "outcome": "not_submitted", "valid": [true, false] }));

        let json = serde_json::to_value(RequestOutcome::Declined).unwrap();
        assert_eq!(json, json!({ "outcome": "declined" }));
    }
}
