// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool dispatch surface for `POST /execute`: maps a tool
//! name and JSON arguments onto the relevant subsystem handle and returns a
//! typed result the HTTP layer wraps in the `content[0].text` envelope.
//!
//! Unknown tool names and malformed arguments never panic — they become
//! [`DispatchError`] values the transport translates into a response.

use std::time::Duration;

use hub_core::{Intent, IntentAction, Lock, Role, WorkItem};
use hub_world::{Conflict, EvaluationResult, Observation, Patch};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock held: {path} is locked by {holder}")]
    LockHeld { path: String, holder: String },

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool(_) => "UNKNOWN_TOOL",
            DispatchError::InvalidInput(_) => "INVALID_INPUT",
            DispatchError::NotFound(_) => "NOT_FOUND",
            DispatchError::LockHeld { .. } => "LOCK_HELD",
            DispatchError::Conflict(_) => "CONFLICT",
        }
    }
}

impl From<hub_core::ToolError> for DispatchError {
    fn from(e: hub_core::ToolError) -> Self {
        match e {
            hub_core::ToolError::NotFound(m) => DispatchError::NotFound(m),
            hub_core::ToolError::LockHeld { path, holder } => {
                DispatchError::LockHeld { path, holder }
            }
            hub_core::ToolError::InvalidInput(m) => DispatchError::InvalidInput(m),
            hub_core::ToolError::Conflict(m) => DispatchError::Conflict(m),
            hub_core::ToolError::Internal(m) => DispatchError::Conflict(m),
        }
    }
}

impl From<hub_docs::DocError> for DispatchError {
    fn from(e: hub_docs::DocError) -> Self {
        match e {
            hub_docs::DocError::NotFound(m) => DispatchError::NotFound(m),
            hub_docs::DocError::InvalidInput(m) => DispatchError::InvalidInput(m),
        }
    }
}

fn field<'a>(args: &'a Value, name: &str) -> Result<&'a Value, DispatchError> {
    args.get(name)
        .ok_or_else(|| DispatchError::InvalidInput(format!("missing required argument: {name}")))
}

fn str_field(args: &Value, name: &str) -> Result<String, DispatchError> {
    field(args, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DispatchError::InvalidInput(format!("{name} must be a string")))
}

fn uuid_field(args: &Value, name: &str) -> Result<Uuid, DispatchError> {
    let raw = str_field(args, name)?;
    Uuid::parse_str(&raw).map_err(|_| DispatchError::InvalidInput(format!("{name} is not a valid id")))
}

fn role_field(args: &Value, name: &str) -> Result<Role, DispatchError> {
    let raw = str_field(args, name)?;
    raw.parse::<Role>().map_err(DispatchError::from)
}

/// The sentinel recorded for `agentId` when a caller has no registered
/// session: requests without a registered caller session still execute
/// but record `agentId = "unknown"`.
pub const UNKNOWN_AGENT: Uuid = Uuid::nil();

/// Resolve the caller's agent id for a request: the `agentId` argument if
/// present and valid, else [`UNKNOWN_AGENT`].
pub fn resolve_agent_id(arguments: &Value) -> Uuid {
    arguments
        .get("agentId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or(UNKNOWN_AGENT)
}

/// Dispatch one tool call. `agent_id` is the caller's id, resolved by the
/// transport via [`resolve_agent_id`] (or [`UNKNOWN_AGENT`]).
pub async fn dispatch(
    state: &AppState,
    tool: &str,
    arguments: &Value,
    agent_id: Uuid,
) -> Result<Value, DispatchError> {
    let args = if arguments.is_null() { &json!({}) } else { arguments };

    match tool {
        "join_workspace" => {
            let name = str_field(args, "name")?;
            let client = str_field(args, "client")?;
            let role = role_field(args, "role")?;
            let autonomous = args.get("autonomous").and_then(Value::as_bool).unwrap_or(false);
            let (agent, version) = state.workspace.join_workspace(name, client, role, autonomous).await?;
            Ok(json!({ "agentId": agent.id, "agent": agent, "version": version }))
        }
        "set_target" => {
            let target = str_field(args, "target")?;
            let version = state.workspace.set_target(target, agent_id).await?;
            Ok(json!({ "ok": true, "version": version }))
        }
        "get_target" => Ok(json!({ "target": state.workspace.get_target().await })),
        "list_agents" => Ok(json!({ "agents": state.workspace.list_agents().await })),
        "post_intent" => {
            let action: IntentAction = str_field(args, "action")?.as_str().into();
            let description = str_field(args, "description")?;
            let version = state
                .workspace
                .post_intent(agent_id, action, description)
                .await?;
            Ok(json!({ "ok": true, "version": version }))
        }
        "read_intents" => {
            let limit = args.get("limit").and_then(Value::as_u64).unwrap_or(50) as usize;
            let intents: Vec<Intent> = state.workspace.read_intents(limit).await;
            Ok(json!({ "intents": intents }))
        }
        "lock_file" => {
            let path = str_field(args, "path")?;
            let reason = args.get("reason").and_then(Value::as_str).map(str::to_string);
            let ttl = duration_field(args, "ttl", state.config.timings.default_lock_ttl);
            let version = state.workspace.lock_file(path, agent_id, ttl, reason).await?;
            Ok(json!({ "ok": true, "version": version }))
        }
        "renew_lock" => {
            let path = str_field(args, "path")?;
            let ttl = duration_field(args, "ttl", state.config.timings.default_lock_ttl);
            let version = state.workspace.renew_lock(path, agent_id, ttl).await?;
            Ok(json!({ "ok": true, "version": version }))
        }
        "check_locks" => {
            let locks: Vec<Lock> = state.workspace.check_locks().await;
            let path_filter = args.get("path").and_then(Value::as_str);
            let locks = match path_filter {
                Some(p) => locks.into_iter().filter(|l| l.path == p).collect(),
                None => locks,
            };
            Ok(json!({ "locks": locks }))
        }
        "unlock_file" => {
            let path = str_field(args, "path")?;
            let handoff = match args.get("handoffTo").and_then(Value::as_str) {
                Some(role) => {
                    let role: Role = role.parse()?;
                    let message = args
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some((role, message))
                }
                None => None,
            };
            let version = state.workspace.unlock_file(path, agent_id, handoff).await?;
            Ok(json!({ "ok": true, "version": version }))
        }
        "poll_work" => {
            let role = role_field(args, "role")?;
            let item: Option<WorkItem> = state.workspace.poll_work(role).await;
            if item.is_some() && agent_id != UNKNOWN_AGENT {
                let _ = state.workspace.touch_agent(agent_id).await;
                if let Some(handoff) = state.workspace.take_handoff_for_role(role).await {
                    return Ok(json!({ "item": item, "handoff": handoff }));
                }
            }
            Ok(json!({ "item": item }))
        }
        "claim_work" => {
            let role = role_field(args, "role")?;
            let item = state.workspace.claim_work(role, agent_id).await?;
            Ok(json!({ "item": item }))
        }
        "complete_work" => {
            let work_id = uuid_field(args, "id")?;
            let next = state.workspace.complete_work(work_id, agent_id).await?;
            Ok(json!({ "ok": true, "nextHandoff": next }))
        }

        "apply_patch" => {
            let patch: Patch = serde_json::from_value(args.clone())
                .map_err(|e| DispatchError::InvalidInput(format!("bad patch: {e}")))?;
            let version = state.world.apply_patch(patch).await;
            Ok(json!({ "ok": true, "version": version }))
        }
        "assert_fact" => {
            let agent = str_field(args, "agent")?;
            let assertion = str_field(args, "assertion")?;
            let confidence = args
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            let source = str_field(args, "source")?;
            let reporter = agent_id;
            let (observation, conflict, version): (Observation, Option<Conflict>, u64) = state
                .world
                .assert_fact(agent, assertion, confidence, source, reporter)
                .await;
            Ok(json!({ "observation": observation, "conflict": conflict, "version": version }))
        }
        "propose_goal" => {
            let description = str_field(args, "description")?;
            let criteria: Vec<String> = field(args, "successCriteria")?
                .as_array()
                .ok_or_else(|| DispatchError::InvalidInput("successCriteria must be an array".to_string()))?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let reporter = agent_id;
            let (id, version) = state.world.propose_goal(description, criteria, reporter).await;
            Ok(json!({ "goalId": id, "version": version }))
        }
        "evaluate_goal" => {
            let id = uuid_field(args, "id")?;
            let reporter = agent_id;
            let result: Option<EvaluationResult> = state.world.evaluate_goal(id, reporter).await;
            match result {
                Some(result) => Ok(serde_json::to_value(result).unwrap()),
                None => Err(DispatchError::NotFound(format!("goal {id}"))),
            }
        }
        "report_failure" => {
            let area = str_field(args, "area")?;
            let reason = str_field(args, "reason")?;
            let reporter = agent_id;
            let version = state.world.report_failure(area, reason, reporter).await;
            Ok(json!({ "ok": true, "version": version }))
        }

        "create_doc" => {
            let path = str_field(args, "path")?;
            let initial = args.get("initial").and_then(Value::as_str).map(str::to_string);
            let result = state.docs.create(path, initial).await;
            Ok(json!({ "created": result.created, "meta": result.meta }))
        }
        "get_snapshot" => {
            let path = str_field(args, "path")?;
            match state.docs.snapshot(path).await {
                Some(bytes) => Ok(json!({ "snapshot": bytes })),
                None => Ok(json!({ "snapshot": Value::Null })),
            }
        }
        "get_text_content" => {
            let path = str_field(args, "path")?;
            Ok(json!({ "text": state.docs.text_content(path).await }))
        }
        "list_sessions" => Ok(json!({ "sessions": state.docs.list_sessions().await })),

        "register_contract" => {
            let spec = serde_json::from_value(args.clone())
                .map_err(|e| DispatchError::InvalidInput(format!("bad contract spec: {e}")))?;
            let change = state.cascade.register_contract(spec).await;
            Ok(json!({ "change": format!("{change:?}") }))
        }
        "bind_frontend" => {
            let component_id = str_field(args, "componentId")?;
            let component_name = str_field(args, "componentName")?;
            let endpoint = str_field(args, "endpoint")?;
            let fields: Vec<String> = field(args, "fields")?
                .as_array()
                .ok_or_else(|| DispatchError::InvalidInput("fields must be an array".to_string()))?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            state
                .cascade
                .bind_frontend(component_id, component_name, endpoint, fields)
                .await;
            Ok(json!({ "ok": true }))
        }
        "get_outdated_components" => Ok(json!({ "components": state.cascade.get_outdated_components().await })),
        "mark_binding_synced" => {
            let component_id = str_field(args, "componentId")?;
            let ok = state.cascade.mark_binding_synced(component_id).await;
            Ok(json!({ "ok": ok }))
        }
        "join_file_session" => {
            let path = str_field(args, "path")?;
            let agent = str_field(args, "agent")?;
            state.cascade.join_file(path, agent).await;
            Ok(json!({ "ok": true }))
        }
        "leave_file_session" => {
            let path = str_field(args, "path")?;
            let agent = str_field(args, "agent")?;
            state.cascade.leave_file(path, agent).await;
            Ok(json!({ "ok": true }))
        }
        "propose_change" => {
            let path = str_field(args, "path")?;
            let agent = str_field(args, "agent")?;
            let start = args.get("start").and_then(Value::as_u64).unwrap_or(0) as u32;
            let end = args.get("end").and_then(Value::as_u64).unwrap_or(0) as u32;
            let text = str_field(args, "text")?;
            let result = state.cascade.propose_change(path, agent, start, end, text).await;
            Ok(serde_json::to_value(result).unwrap())
        }

        other => Err(DispatchError::UnknownTool(other.to_string())),
    }
}

fn duration_field(args: &Value, name: &str, default: Duration) -> Duration {
    args.get(name)
        .and_then(Value::as_u64)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// The `agentId`/`clientId` pair a transport resolved for this call, or the
/// `"unknown"` fallback when no session mapping exists.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
}
