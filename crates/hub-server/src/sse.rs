// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Change-notification SSE transport backing `GET /events/stream`:
//! a long-lived stream of `tick` events carrying the combined hub version,
//! so a client can avoid polling `/changes`. Mirrors the broadcast-to-stream
//! bridging the collab WebSocket does in [`crate::collab`], just with a
//! one-way `async-stream` instead of a socket.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;

use crate::state::AppState;

pub async fn events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.changes.subscribe();
    let initial = state.hub_version();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("tick")
            .data(json!({ "type": "tick", "version": initial }).to_string()));

        loop {
            match rx.recv().await {
                Ok(version) => {
                    yield Ok(Event::default()
                        .event("tick")
                        .data(json!({ "type": "tick", "version": version }).to_string()));
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Client missed some versions; the next tick's number
                    // alone is enough for it to resync via /state.
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
