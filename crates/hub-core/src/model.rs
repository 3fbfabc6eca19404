// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The workspace data model: agents, locks, intents, handoffs, and
//! work items.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AgentId = Uuid;

/// Client kind is an intentionally open tag — the fleet grows new client
/// UIs (planner/coder/tester front ends, web assistants, terminals) faster
/// than this crate should need a release to recognize them.
pub type ClientKind = String;

/// An agent's functional role within the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Planner,
    Backend,
    Frontend,
    Coder,
    Tester,
    Refactor,
    Observer,
    /// Matches any `forRole` when polling work.
    Any,
}

impl Role {
    /// Roles willing to accept work items posted `for_role == self` under
    /// the cross-substitution rule (`assignWork`): `coder` also drains
    /// `fixer`-labeled work and vice versa. `fixer` is not a first class
    /// [`Role`] variant in the agent model but work items may still be
    /// labeled `fixer` by the convergence engine (`reportFailure`), so
    /// matching is done on the work item's `for_role` string rather than
    /// only on [`Role`].
    pub fn acceptable_work_roles(self) -> &'static [&'static str] {
        match self {
            Role::Coder => &["coder", "fixer"],
            Role::Refactor => &["fixer", "refactor"],
            Role::Planner => &["planner"],
            Role::Backend => &["backend"],
            Role::Frontend => &["frontend"],
            Role::Tester => &["tester"],
            Role::Observer => &["observer"],
            Role::Any => &["any"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Backend => "backend",
            Role::Frontend => "frontend",
            Role::Coder => "coder",
            Role::Tester => "tester",
            Role::Refactor => "refactor",
            Role::Observer => "observer",
            Role::Any => "any",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planner" => Ok(Role::Planner),
            "backend" => Ok(Role::Backend),
            "frontend" => Ok(Role::Frontend),
            "coder" => Ok(Role::Coder),
            "tester" => Ok(Role::Tester),
            "refactor" => Ok(Role::Refactor),
            "observer" => Ok(Role::Observer),
            "any" => Ok(Role::Any),
            other => Err(crate::error::ToolError::InvalidInput(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Waiting,
    Disconnected,
}

/// A fleet participant — human or autonomous agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub client: ClientKind,
    pub role: Role,
    pub status: AgentStatus,
    pub current_task: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub autonomous: bool,

    /// Monotonic mirror of `last_seen`, used internally by the presence
    /// sweeper so staleness comparisons are immune to wall-clock skew or
    /// adjustment. Never serialized.
    #[serde(skip)]
    pub(crate) last_seen_monotonic: Instant,
}

impl Agent {
    pub fn new(name: String, client: ClientKind, role: Role, autonomous: bool) -> Self {
        let now = crate::clock::now_utc();
        Self {
            id: crate::clock::new_id(),
            name,
            client,
            role,
            status: AgentStatus::Idle,
            current_task: None,
            joined_at: now,
            last_seen: now,
            autonomous,
            last_seen_monotonic: crate::clock::now_monotonic(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = crate::clock::now_utc();
        self.last_seen_monotonic = crate::clock::now_monotonic();
    }
}

/// An exclusive, time-bounded claim on a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub path: String,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub client: ClientKind,
    pub role: Role,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,

    #[serde(skip)]
    pub(crate) expires_at_monotonic: Instant,
}

/// An append-only announcement of what an agent is doing or has done.
///
/// `action` is an open enum: well-known actions get a named variant,
/// anything else is preserved verbatim via `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    Working,
    Blocked,
    Completed,
    TargetSet,
    Handoff,
    #[serde(untagged)]
    Custom(String),
}

impl IntentAction {
    pub fn as_str(&self) -> &str {
        match self {
            IntentAction::Working => "working",
            IntentAction::Blocked => "blocked",
            IntentAction::Completed => "completed",
            IntentAction::TargetSet => "target_set",
            IntentAction::Handoff => "handoff",
            IntentAction::Custom(s) => s,
        }
    }
}

impl From<&str> for IntentAction {
    fn from(s: &str) -> Self {
        match s {
            "working" => IntentAction::Working,
            "blocked" => IntentAction::Blocked,
            "completed" => IntentAction::Completed,
            "target_set" => IntentAction::TargetSet,
            "handoff" => IntentAction::Handoff,
            other => IntentAction::Custom(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub client: ClientKind,
    pub action: IntentAction,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A message attached to a recently released lock, consumed when the
/// receiving role next polls work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handoff {
    pub from: AgentId,
    pub to: Role,
    pub message: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    Assigned,
    Completed,
}

/// A unit of work posted to the shared, priority-ordered work queue.
///
/// `for_role` is a plain string rather than [`Role`] because the convergence
/// engine posts work for the synthetic `fixer` label, which has
/// no corresponding agent [`Role`] variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub description: String,
    pub for_role: String,
    pub created_by: AgentId,
    pub created_at: DateTime<Utc>,
    pub assigned_to: Option<AgentId>,
    pub status: WorkStatus,
    pub context: Option<serde_json::Value>,
    pub priority: i64,

    /// Set when a goal-driven work item should re-evaluate that goal on
    /// completion. Not part of the core field list but needed to thread
    /// the goal id through the
    /// queue without hub-core depending on hub-world's goal type.
    pub goal_id: Option<Uuid>,

    /// Monotonic timestamp of the last `assigned` transition, used by the
    /// convergence tick to detect work stuck in `assigned` for >30s.
    #[serde(skip)]
    pub(crate) assigned_at_monotonic: Option<Instant>,
    /// Monotonic timestamp of the `completed` transition, used to retire
    /// completed work older than 60s.
    #[serde(skip)]
    pub(crate) completed_at_monotonic: Option<Instant>,
}

impl WorkItem {
    pub fn new(
        description: String,
        for_role: String,
        created_by: AgentId,
        context: Option<serde_json::Value>,
        priority: i64,
        goal_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: crate::clock::new_id(),
            description,
            for_role,
            created_by,
            created_at: crate::clock::now_utc(),
            assigned_to: None,
            status: WorkStatus::Pending,
            context,
            priority,
            goal_id,
            assigned_at_monotonic: None,
            completed_at_monotonic: None,
        }
    }
}
