// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The bidirectional collab WebSocket channel: per-connection CRDT
//! doc-session bridge. `tokio::select!` between socket recv and a channel
//! of outbound [`hub_docs::Frame`]s, with a ping/pong heartbeat and
//! per-message logging helper.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use hub_docs::{AwarenessPatch, Frame};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub async fn collab_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InboundFrame {
    Join {
        path: String,
        #[serde(default)]
        agent_id: Option<Uuid>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        environment: Option<String>,
    },
    Awareness {
        #[serde(default)]
        cursor: Option<u32>,
        #[serde(default)]
        is_typing: Option<bool>,
    },
    Leave,
}

/// NEW -> JOINED -> CLOSED.
enum ConnState {
    New,
    Joined { path: String, agent_id: Uuid },
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let channel_id: Uuid = Uuid::new_v4();
    let mut conn = ConnState::New;
    let mut awaiting_pong = false;

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Frame>();
    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick fires immediately

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&state, &mut socket, &mut conn, channel_id, &frame_tx, &text).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if let ConnState::Joined { path, .. } = &conn {
                            if let Err(e) = state.docs.apply_update(path.clone(), bytes, channel_id).await {
                                send_error(&mut socket, &e.to_string()).await;
                            }
                        }
                        // Binary frames before join are a no-op.
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%channel_id, "collab socket recv error: {e}");
                        break;
                    }
                }
            }
            frame = frame_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if awaiting_pong {
                    tracing::debug!(%channel_id, "collab socket missed heartbeat pong, closing");
                    break;
                }
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
        }
    }

    if let ConnState::Joined { path, agent_id } = conn {
        state.docs.leave(path, channel_id, Some(agent_id)).await;
    }
}

async fn handle_text(
    state: &AppState,
    socket: &mut WebSocket,
    conn: &mut ConnState,
    channel_id: Uuid,
    frame_tx: &mpsc::UnboundedSender<Frame>,
    text: &str,
) {
    let parsed: Result<InboundFrame, _> = serde_json::from_str(text);
    match parsed {
        Ok(InboundFrame::Join {
            path,
            agent_id,
            name,
            role,
            environment,
        }) => {
            let agent_id = agent_id.unwrap_or_else(Uuid::new_v4);
            let name = name.unwrap_or_else(|| "anonymous".to_string());
            let role = role.unwrap_or_else(|| "observer".to_string());

            state.docs.create(path.clone(), None).await;
            let joined = state
                .docs
                .join(path.clone(), channel_id, agent_id, name, role, environment, frame_tx.clone())
                .await;

            match joined {
                Some((snapshot, _editors)) => {
                    *conn = ConnState::Joined { path, agent_id };
                    let _ = send_frame(socket, &Frame::Sync { snapshot }).await;
                }
                None => {
                    send_error(socket, "unknown or uninitialized doc session").await;
                }
            }
        }
        Ok(InboundFrame::Awareness { cursor, is_typing }) => match conn {
            ConnState::Joined { path, agent_id } => {
                let patch = AwarenessPatch { cursor, is_typing };
                if let Err(e) = state.docs.update_awareness(path.clone(), *agent_id, patch).await {
                    send_error(socket, &e.to_string()).await;
                }
            }
            ConnState::New => {
                send_error(socket, "awareness sent before join").await;
            }
        },
        Ok(InboundFrame::Leave) => {
            if let ConnState::Joined { path, agent_id } = conn {
                state.docs.leave(path.clone(), channel_id, Some(*agent_id)).await;
            }
            *conn = ConnState::New;
        }
        Err(_) => {
            send_error(socket, &format!("Unknown message type: {text}")).await;
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    match frame {
        Frame::Sync { snapshot } => {
            socket
                .send(Message::Text(
                    json!({ "type": "sync", "snapshot": snapshot }).to_string(),
                ))
                .await
        }
        Frame::Awareness { editors } => {
            socket
                .send(Message::Text(
                    json!({ "type": "awareness", "editors": editors }).to_string(),
                ))
                .await
        }
        Frame::Update(bytes) => socket.send(Message::Binary(bytes.clone())).await,
        Frame::Error { message } => {
            socket
                .send(Message::Text(json!({ "type": "error", "message": message }).to_string()))
                .await
        }
    }
}

async fn send_error(socket: &mut WebSocket, message: &str) {
    let _ = socket
        .send(Message::Text(json!({ "type": "error", "message": message }).to_string()))
        .await;
}
