// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Dapp session handling: request types, UI events and the pipeline that
//! drives each request from approval to outcome.

pub mod encoding;
pub mod events;
pub mod pipeline;
pub mod request;


pub use events::{RequestId, SessionState, UiEvent, UserDecision};
pub use pipeline::{SessionPipeline, SessionServices, MAX_AUTH_ATTEMPTS};
pub use request::{
    DappIdentity, InboundRequest, RequestKind, RequestOutcome, SessionRequest, SignInPayload,
};
