// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! API contract propagation, frontend-binding freshness, and the OT-lite
//! collaborative merge demo.

pub mod actor;
pub mod contract;
pub mod engine;
pub mod log;
pub mod merge;

pub use actor::{CascadeActor, CascadeHandle};
pub use contract::{Binding, Contract, ContractChange, ContractRegistry, ContractSpec, Field};
pub use engine::CascadeEngine;
pub use log::{CascadeEvent, CascadeLog, CascadeSubscriber};
pub use merge::{MergeSessions, ProposeChangeResult, ProposedChange};

pub(crate) fn clock_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

pub(crate) fn new_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}
