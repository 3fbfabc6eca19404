// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Collaborative document sessions: per-path CRDT documents, awareness, and
//! deferred GC of emptied sessions.

pub mod actor;
pub mod color;
pub mod error;
pub mod manager;
pub mod session;

pub use actor::{DocActor, DocHandle};
pub use error::DocError;
pub use manager::{CreateResult, DocManager, GC_DELAY};
pub use session::{Awareness, AwarenessPatch, ChannelId, DocSession, Frame, SessionMeta};

pub(crate) fn clock_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}
