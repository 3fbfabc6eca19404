// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The three transports the hub exposes: control-plane HTTP (`axum`),
//! change-notification SSE, and the bidirectional collab WebSocket channel.

pub mod collab;
pub mod dispatch;
pub mod http;
pub mod router;
pub mod sse;
pub mod state;

pub use router::{build_router, serve};
pub use state::{new_state, AppState};
