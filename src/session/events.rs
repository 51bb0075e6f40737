// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Messages exchanged between the session pipeline and the approval UI.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::request::{RequestKind, SessionRequest};
use crate::scanner::ScanState;

pub type RequestId = Uuid;

/// Where the pipeline is with the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingApproval(RequestKind),
    Approved(RequestKind),
    Declined(RequestKind),
    Signing(RequestKind),
    Submitting,
    Complete(RequestKind),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingApproval(kind) => write!(f, "awaiting_approval({kind})"),
            Self::Approved(kind) => write!(f, "approved({kind})"),
            Self::Declined(kind) => write!(f, "declined({kind})"),
            Self::Signing(kind) => write!(f, "signing({kind})"),
            Self::Submitting => f.write_str("submitting"),
            Self::Complete(kind) => write!(f, "complete({kind})"),
        }
    }
}

/// Sent to the UI. The UI never sees key material.
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Ask the user to approve or decline.
    Present {
        request_id: RequestId,
        request: SessionRequest,
    },
    ScanUpdated {
        request_id: RequestId,
        state: ScanState,
    },
    /// The ceremony after approval failed; the request is presented again.
    AuthenticationFailed {
        request_id: RequestId,
        reason: String,
    },
    /// The request is finished or abandoned; close its screen.
    Dismissed { request_id: RequestId },
}

impl UiEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Present { request_id, .. }
            | Self::ScanUpdated { request_id, .. }
            | Self::AuthenticationFailed { request_id, .. }
            | Self::Dismissed { request_id } => *request_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserDecision {
    pub request_id: RequestId,
    pub approved: bool,
}

impl UserDecision {
    pub fn approve(request_id: RequestId) -> Self {
        Self {
            request_id,
            approved: true,
        }
    }

    pub fn decline(request_id: RequestId) -> Self {
        Self {
            request_id,
            approved: false,
        }
    }
}
