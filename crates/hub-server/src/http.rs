// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Control-plane HTTP handlers: `/execute`, `/state`, `/graph`,
//! `/sessions`, `/changes`, `/health`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::{dispatch, resolve_agent_id, ExecuteRequest};
use crate::state::AppState;

pub async fn execute(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Response {
    let request: ExecuteRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("malformed request: {e}") })),
            )
                .into_response();
        }
    };

    if request.tool.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing required field: tool" })),
        )
            .into_response();
    }

    let agent_id = resolve_agent_id(&request.arguments);
    tracing::debug!(tool = %request.tool, client = ?request.client_id, "dispatching tool call");

    match dispatch(&state, &request.tool, &request.arguments, agent_id).await {
        Ok(value) => {
            let text = serde_json::to_string(&value).unwrap_or_default();
            Json(json!({ "content": [{ "type": "text", "text": text }] })).into_response()
        }
        Err(e) if e.kind() == "UNKNOWN_TOOL" => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => {
            let body = json!({
                "error": e.to_string(),
                "kind": e.kind(),
                "tool": request.tool,
                "arguments": request.arguments,
            });
            let text = serde_json::to_string(&body).unwrap_or_default();
            Json(json!({ "content": [{ "type": "text", "text": text }] })).into_response()
        }
    }
}

pub async fn state_snapshot(State(state): State<AppState>) -> Json<Value> {
    let agents = state.workspace.list_agents().await;
    let locks = state.workspace.check_locks().await;
    let intents = state.workspace.read_intents(50).await;
    let target = state.workspace.get_target().await;
    let version = state.workspace.version().await;
    let work_queue = state.workspace.list_work().await;
    Json(json!({
        "agents": agents,
        "locks": locks,
        "intents": intents,
        "workQueue": work_queue,
        "target": target,
        "version": version,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    format: Option<String>,
}

pub async fn graph(State(state): State<AppState>, Query(q): Query<GraphQuery>) -> Json<Value> {
    let (world_version, goals) = state.world.snapshot().await;
    let agents = state.workspace.list_agents().await;

    let mut nodes: Vec<Value> = Vec::new();
    let mut edges: Vec<Value> = Vec::new();
    for agent in &agents {
        nodes.push(json!({ "id": agent.id, "kind": "agent", "name": agent.name }));
    }
    for goal in &goals {
        nodes.push(json!({ "id": goal.id, "kind": "goal", "description": goal.description, "status": goal.status }));
    }

    if q.format.as_deref() == Some("widget") {
        let locks = state.workspace.check_locks().await;
        let intents = state.workspace.read_intents(20).await;
        let recent_events = state.cascade.recent_events(20).await;
        let doc_sessions = state.docs.list_sessions().await;
        let target = state.workspace.get_target().await;
        let work_queue = state.workspace.list_work().await;
        return Json(json!({
            "agents": agents,
            "locks": locks,
            "intents": intents,
            "edges": edges,
            "recentEvents": recent_events,
            "docSessions": doc_sessions,
            "workQueue": work_queue,
            "target": target,
            "lastUpdate": state.hub_version(),
        }));
    }

    Json(json!({ "nodes": nodes, "edges": edges, "version": world_version }))
}

pub async fn sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.docs.list_sessions().await;
    Json(json!({ "count": sessions.len(), "sessions": sessions }))
}

#[derive(Debug, Deserialize)]
pub struct ChangesQuery {
    since: Option<u64>,
}

pub async fn changes(State(state): State<AppState>, Query(q): Query<ChangesQuery>) -> Json<Value> {
    let since = q.since.unwrap_or(0);
    let version = state.hub_version();
    let target = state.workspace.get_target().await;
    Json(json!({
        "changed": version != since,
        "target": target,
        "version": version,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let agents = state.workspace.list_agents().await;
    Json(json!({
        "status": "ok",
        "agents": agents.len(),
        "version": state.hub_version(),
    }))
}
