// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The workspace store: the single source of truth for agents, locks,
//! intents, handoffs, the shared target, and the work queue.
//!
//! This type is deliberately synchronous and `&mut self`-only — it is never
//! shared across tasks directly. [`crate::actor::WorkspaceActor`] owns one
//! instance and serializes all access through a command channel, which is
//! what gives the rest of the process single-threaded semantics over the
//! store even though the binary runs on a multi-threaded tokio runtime.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::ToolError;
use crate::model::{Agent, AgentId, AgentStatus, Handoff, Intent, IntentAction, Lock, Role, WorkItem};
use crate::queue::WorkQueue;

const MAX_INTENTS: usize = 50;
const PRESENCE_WAITING_AFTER: Duration = Duration::from_secs(2 * 60);

#[derive(Debug, Default)]
pub struct WorkspaceStore {
    agents: HashMap<AgentId, Agent>,
    locks: HashMap<String, Lock>,
    intents: VecDeque<Intent>,
    handoffs: Vec<Handoff>,
    target: Option<String>,
    queue: WorkQueue,
    /// Bumped on every mutation that should be visible to `/changes`
    /// pollers. Exposed read-only via [`Self::version`].
    version: u64,
}

impl WorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ---- agents -----------------------------------------------------

    pub fn join_workspace(
        &mut self,
        name: String,
        client: String,
        role: Role,
        autonomous: bool,
    ) -> (Agent, u64) {
        let agent = Agent::new(name, client, role, autonomous);
        self.agents.insert(agent.id, agent.clone());
        let v = self.bump();
        (agent, v)
    }

    pub fn list_agents(&self) -> Vec<&Agent> {
        self.agents.values().collect()
    }

    pub fn get_agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn touch_agent(&mut self, id: AgentId) -> Result<(), ToolError> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| ToolError::NotFound(format!("agent {id}")))?;
        agent.touch();
        if agent.status == AgentStatus::Disconnected {
            agent.status = AgentStatus::Idle;
        }
        self.bump();
        Ok(())
    }

    pub fn set_agent_status(&mut self, id: AgentId, status: AgentStatus) -> Result<(), ToolError> {
        let agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| ToolError::NotFound(format!("agent {id}")))?;
        agent.status = status;
        self.bump();
        Ok(())
    }

    // ---- target -------------------------------------------------------

    pub fn set_target(&mut self, target: String, agent_id: AgentId) -> Result<u64, ToolError> {
        let agent_name = self
            .get_agent(agent_id)
            .map(|a| a.name.clone())
            .ok_or_else(|| ToolError::NotFound(format!("agent {agent_id}")))?;
        self.target = Some(target.clone());
        self.push_intent(
            agent_id,
            agent_name,
            String::new(),
            IntentAction::TargetSet,
            target,
        );
        Ok(self.bump())
    }

    pub fn get_target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    // ---- intents --------------------------------------------------------

    pub fn post_intent(
        &mut self,
        agent_id: AgentId,
        action: IntentAction,
        description: String,
    ) -> Result<u64, ToolError> {
        let agent = self
            .get_agent(agent_id)
            .ok_or_else(|| ToolError::NotFound(format!("agent {agent_id}")))?;
        let agent_name = agent.name.clone();
        let client = agent.client.clone();
        self.push_intent(agent_id, agent_name, client, action, description);
        Ok(self.bump())
    }

    fn push_intent(
        &mut self,
        agent_id: AgentId,
        agent_name: String,
        client: String,
        action: IntentAction,
        description: String,
    ) {
        if self.intents.len() >= MAX_INTENTS {
            self.intents.pop_front();
        }
        self.intents.push_back(Intent {
            id: crate::clock::new_id(),
            agent_id,
            agent_name,
            client,
            action,
            description,
            timestamp: crate::clock::now_utc(),
        });
    }

    pub fn read_intents(&self, limit: usize) -> Vec<&Intent> {
        self.intents.iter().rev().take(limit).collect()
    }

    // ---- locks ----------------------------------------------------------

    pub fn lock_file(
        &mut self,
        path: String,
        agent_id: AgentId,
        ttl: Duration,
        reason: Option<String>,
    ) -> Result<u64, ToolError> {
        let agent = self
            .get_agent(agent_id)
            .ok_or_else(|| ToolError::NotFound(format!("agent {agent_id}")))?
            .clone();

        if let Some(existing) = self.locks.get(&path) {
            if existing.agent_id != agent_id {
                return Err(ToolError::LockHeld {
                    path,
                    holder: existing.agent_name.clone(),
                });
            }
        }

        let now_monotonic = Instant::now();
        self.locks.insert(
            path.clone(),
            Lock {
                path: path.clone(),
                agent_id,
                agent_name: agent.name.clone(),
                client: agent.client.clone(),
                role: agent.role,
                locked_at: crate::clock::now_utc(),
                expires_at: crate::clock::now_utc()
                    + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30)),
                reason: reason.clone(),
                expires_at_monotonic: now_monotonic + ttl,
            },
        );

        if let Some(a) = self.agents.get_mut(&agent_id) {
            a.current_task = Some(path.clone());
            a.status = AgentStatus::Working;
        }
        self.push_intent(
            agent_id,
            agent.name,
            agent.client,
            IntentAction::Working,
            reason.unwrap_or_else(|| format!("locked {path}")),
        );

        Ok(self.bump())
    }

    pub fn renew_lock(&mut self, path: &str, agent_id: AgentId, ttl: Duration) -> Result<u64, ToolError> {
        let lock = self
            .locks
            .get_mut(path)
            .ok_or_else(|| ToolError::NotFound(format!("lock {path}")))?;
        if lock.agent_id != agent_id {
            return Err(ToolError::LockHeld {
                path: path.to_string(),
                holder: lock.agent_name.clone(),
            });
        }
        lock.expires_at_monotonic = Instant::now() + ttl;
        lock.expires_at = crate::clock::now_utc()
            + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30));
        Ok(self.bump())
    }

    pub fn check_locks(&self) -> Vec<&Lock> {
        self.locks.values().collect()
    }

    pub fn lock_holder(&self, path: &str) -> Option<&Lock> {
        self.locks.get(path)
    }

    /// Release `path`, optionally leaving a handoff for the next agent of
    /// role `to` who polls work.
    pub fn unlock_file(
        &mut self,
        path: &str,
        agent_id: AgentId,
        handoff: Option<(Role, String)>,
    ) -> Result<u64, ToolError> {
        let lock = self
            .locks
            .get(path)
            .ok_or_else(|| ToolError::NotFound(format!("lock {path}")))?;
        if lock.agent_id != agent_id {
            return Err(ToolError::LockHeld {
                path: path.to_string(),
                holder: lock.agent_name.clone(),
            });
        }
        self.locks.remove(path);
        if let Some((to, message)) = handoff {
            self.handoffs.push(Handoff {
                from: agent_id,
                to,
                message,
                path: path.to_string(),
                created_at: crate::clock::now_utc(),
            });
        }
        Ok(self.bump())
    }

    /// Take the first pending handoff addressed to `role`, if any.
    pub fn take_handoff_for_role(&mut self, role: Role) -> Option<Handoff> {
        let idx = self.handoffs.iter().position(|h| h.to == role)?;
        Some(self.handoffs.remove(idx))
    }

    /// Sweep expired locks, returning the paths released. Called
    /// periodically by [`crate::actor::WorkspaceActor`]: each
    /// expired lock is deleted, its holder is idled if it was still their
    /// `current_task`, and a `handoff` intent records the reclaim.
    pub fn sweep_expired_locks(&mut self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<Lock> = self
            .locks
            .values()
            .filter(|lock| lock.expires_at_monotonic <= now)
            .cloned()
            .collect();

        for lock in &expired {
            self.locks.remove(&lock.path);
            if let Some(agent) = self.agents.get_mut(&lock.agent_id) {
                if agent.current_task.as_deref() == Some(lock.path.as_str()) {
                    agent.current_task = None;
                    agent.status = AgentStatus::Idle;
                }
            }
            self.push_intent(
                lock.agent_id,
                lock.agent_name.clone(),
                lock.client.clone(),
                IntentAction::Handoff,
                format!("lock on {} expired and was reclaimed", lock.path),
            );
        }

        if !expired.is_empty() {
            self.bump();
        }
        expired.into_iter().map(|lock| lock.path).collect()
    }

    /// Sweep agent presence: mark agents idle->waiting->disconnected based
    /// on elapsed time since last contact, and drop agents stale long
    /// enough to be removed entirely. Returns the ids removed.
    pub fn sweep_presence(
        &mut self,
        disconnect_after: Duration,
        remove_after: Duration,
    ) -> Vec<AgentId> {
        let now = Instant::now();
        let mut removed = Vec::new();
        let mut changed = false;
        self.agents.retain(|id, agent| {
            let elapsed = now.saturating_duration_since(agent.last_seen_monotonic);
            if elapsed >= remove_after {
                removed.push(*id);
                changed = true;
                return false;
            }
            if elapsed >= disconnect_after && agent.status != AgentStatus::Disconnected {
                agent.status = AgentStatus::Disconnected;
                agent.current_task = None;
                changed = true;
            } else if elapsed >= PRESENCE_WAITING_AFTER
                && agent.status == AgentStatus::Idle
            {
                agent.status = AgentStatus::Waiting;
                changed = true;
            }
            true
        });
        if changed {
            self.bump();
        }
        removed
    }

    // ---- work queue -------------------------------------------------

    pub fn enqueue_work(&mut self, item: WorkItem) -> u64 {
        self.queue.enqueue(item);
        self.bump()
    }

    pub fn poll_work(&self, role: Role) -> Option<&WorkItem> {
        self.queue.poll_for_role(role)
    }

    pub fn claim_work(&mut self, role: Role, agent_id: AgentId) -> Result<&WorkItem, ToolError> {
        let work_id = self
            .queue
            .claim(role, agent_id)
            .ok_or_else(|| ToolError::NotFound("no matching work item".to_string()))?;
        self.bump();

        let description = self
            .queue
            .get(work_id)
            .ok_or_else(|| ToolError::Internal("claimed item vanished".to_string()))?
            .description
            .clone();
        if let Some(agent) = self.agents.get_mut(&agent_id) {
            agent.current_task = Some(description);
            agent.status = AgentStatus::Working;
        }

        self.queue
            .get(work_id)
            .ok_or_else(|| ToolError::Internal("claimed item vanished".to_string()))
    }

    pub fn complete_work(&mut self, work_id: Uuid, agent_id: AgentId) -> Result<Option<Uuid>, ToolError> {
        let goal_id = self
            .queue
            .complete(work_id, agent_id)
            .ok_or_else(|| ToolError::NotFound(format!("work item {work_id}")))?;
        self.bump();
        Ok(goal_id)
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut WorkQueue {
        &mut self.queue
    }

    pub fn list_work(&self) -> Vec<&WorkItem> {
        self.queue.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_agent() -> (WorkspaceStore, AgentId) {
        let mut store = WorkspaceStore::new();
        let (agent, _) = store.join_workspace(
            "alice".to_string(),
            "cli".to_string(),
            Role::Coder,
            false,
        );
        (store, agent.id)
    }

    #[test]
    fn join_workspace_bumps_version() {
        let mut store = WorkspaceStore::new();
        assert_eq!(store.version(), 0);
        store.join_workspace("a".to_string(), "cli".to_string(), Role::Coder, false);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn lock_file_sets_current_task_and_posts_working_intent() {
        let (mut store, alice) = store_with_agent();
        store
            .lock_file("src/a.rs".to_string(), alice, Duration::from_secs(30), None)
            .unwrap();

        let agent = store.get_agent(alice).unwrap();
        assert_eq!(agent.current_task.as_deref(), Some("src/a.rs"));
        assert_eq!(agent.status, AgentStatus::Working);

        let latest = store.read_intents(1);
        let intent = latest.first().unwrap();
        assert_eq!(intent.action, IntentAction::Working);
    }

    #[test]
    fn claim_work_sets_current_task() {
        let (mut store, alice) = store_with_agent();
        store.enqueue_work(WorkItem::new(
            "fix the thing".to_string(),
            "coder".to_string(),
            alice,
            None,
            1,
            None,
        ));
        store.claim_work(Role::Coder, alice).unwrap();

        let agent = store.get_agent(alice).unwrap();
        assert_eq!(agent.current_task.as_deref(), Some("fix the thing"));
        assert_eq!(agent.status, AgentStatus::Working);
    }

    #[test]
    fn lock_then_relock_by_other_agent_fails() {
        let (mut store, alice) = store_with_agent();
        store
            .lock_file("src/a.rs".to_string(), alice, Duration::from_secs(30), None)
            .unwrap();

        let (bob, _) = store.join_workspace("bob".to_string(), "cli".to_string(), Role::Coder, false);
        let err = store
            .lock_file("src/a.rs".to_string(), bob.id, Duration::from_secs(30), None)
            .unwrap_err();
        assert!(matches!(err, ToolError::LockHeld { .. }));
    }

    #[test]
    fn unlock_requires_holder() {
        let (mut store, alice) = store_with_agent();
        store
            .lock_file("src/a.rs".to_string(), alice, Duration::from_secs(30), None)
            .unwrap();
        let (bob, _) = store.join_workspace("bob".to_string(), "cli".to_string(), Role::Coder, false);
        let err = store.unlock_file("src/a.rs", bob.id, None).unwrap_err();
        assert!(matches!(err, ToolError::LockHeld { .. }));
    }

    #[test]
    fn unlock_with_handoff_is_consumed_once() {
        let (mut store, alice) = store_with_agent();
        store
            .lock_file("src/a.rs".to_string(), alice, Duration::from_secs(30), None)
            .unwrap();
        store
            .unlock_file(
                "src/a.rs",
                alice,
                Some((Role::Tester, "please test".to_string())),
            )
            .unwrap();
        assert!(store.take_handoff_for_role(Role::Tester).is_some());
        assert!(store.take_handoff_for_role(Role::Tester).is_none());
    }

    #[test]
    fn expired_lock_idles_holder_and_leaves_handoff_intent() {
        let (mut store, alice) = store_with_agent();
        store
            .lock_file(
                "src/x.ts".to_string(),
                alice,
                Duration::from_millis(1),
                None,
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let expired = store.sweep_expired_locks();
        assert_eq!(expired, vec!["src/x.ts".to_string()]);

        let agent = store.get_agent(alice).unwrap();
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.current_task, None);

        let latest = store.read_intents(1);
        let intent = latest.first().unwrap();
        assert_eq!(intent.action, IntentAction::Handoff);
        assert!(intent.description.contains("src/x.ts"));
    }

    #[test]
    fn intents_ring_buffer_caps_at_fifty() {
        let (mut store, alice) = store_with_agent();
        for i in 0..60 {
            store
                .post_intent(alice, IntentAction::Working, format!("step {i}"))
                .unwrap();
        }
        assert_eq!(store.read_intents(1000).len(), MAX_INTENTS);
    }
}
