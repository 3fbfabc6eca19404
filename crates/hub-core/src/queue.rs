// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The shared, priority-ordered work queue.
//!
//! A single [`WorkQueue`] instance is owned by the workspace store and
//! reused by the convergence engine for goal-driven scheduling, so there is
//! exactly one queue in the process rather than one per component.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::model::{AgentId, Role, WorkItem, WorkStatus};

const STUCK_ASSIGNED_AFTER: Duration = Duration::from_secs(30);
const RETIRE_COMPLETED_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
pub struct WorkQueue {
    items: VecDeque<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a work item, keeping the queue sorted by descending priority.
    /// Items of equal priority preserve arrival order (stable insert at the
    /// back of their priority band).
    pub fn enqueue(&mut self, item: WorkItem) {
        let pos = self
            .items
            .iter()
            .position(|existing| existing.priority < item.priority)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }

    /// Return the highest-priority pending item matching `role`, without
    /// claiming it.
    pub fn poll_for_role(&self, role: Role) -> Option<&WorkItem> {
        let acceptable = role.acceptable_work_roles();
        self.items.iter().find(|item| {
            item.status == WorkStatus::Pending
                && (acceptable.contains(&item.for_role.as_str()) || item.for_role == "any")
        })
    }

    /// Claim the highest-priority pending item matching `role` for `agent`,
    /// returning its id.
    pub fn claim(&mut self, role: Role, agent: AgentId) -> Option<Uuid> {
        let acceptable = role.acceptable_work_roles();
        let idx = self.items.iter().position(|item| {
            item.status == WorkStatus::Pending
                && (acceptable.contains(&item.for_role.as_str()) || item.for_role == "any")
        })?;
        let item = &mut self.items[idx];
        item.status = WorkStatus::Assigned;
        item.assigned_to = Some(agent);
        item.assigned_at_monotonic = Some(Instant::now());
        Some(item.id)
    }

    /// Mark an assigned item completed. Returns the item's `goal_id` so the
    /// caller can trigger goal re-evaluation, or `None` if no matching
    /// assigned item was found for this agent.
    pub fn complete(&mut self, work_id: Uuid, agent: AgentId) -> Option<Option<Uuid>> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == work_id && item.assigned_to == Some(agent))?;
        item.status = WorkStatus::Completed;
        item.completed_at_monotonic = Some(Instant::now());
        Some(item.goal_id)
    }

    pub fn get(&self, work_id: Uuid) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == work_id)
    }

    pub fn pending_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == WorkStatus::Pending)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }

    /// Re-queue items that have sat `assigned` for more than 30s, returning
    /// their ids so callers can log/notify. Called from the convergence
    /// tick.
    pub fn retry_stuck(&mut self) -> Vec<Uuid> {
        let now = Instant::now();
        let mut retried = Vec::new();
        for item in self.items.iter_mut() {
            if item.status == WorkStatus::Assigned {
                if let Some(assigned_at) = item.assigned_at_monotonic {
                    if crate::clock::has_elapsed(assigned_at, now, STUCK_ASSIGNED_AFTER) {
                        item.status = WorkStatus::Pending;
                        item.assigned_to = None;
                        item.assigned_at_monotonic = None;
                        retried.push(item.id);
                    }
                }
            }
        }
        retried
    }

    /// Drop completed items older than 60s.
    pub fn retire_completed(&mut self) -> usize {
        let now = Instant::now();
        let before = self.items.len();
        self.items.retain(|item| {
            !(item.status == WorkStatus::Completed
                && item
                    .completed_at_monotonic
                    .map(|t| crate::clock::has_elapsed(t, now, RETIRE_COMPLETED_AFTER))
                    .unwrap_or(false))
        });
        before - self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkItem;

    fn item(priority: i64, for_role: &str) -> WorkItem {
        WorkItem::new(
            "do the thing".to_string(),
            for_role.to_string(),
            Uuid::new_v4(),
            None,
            priority,
            None,
        )
    }

    #[test]
    fn enqueue_orders_by_descending_priority() {
        let mut q = WorkQueue::new();
        q.enqueue(item(1, "coder"));
        q.enqueue(item(5, "coder"));
        q.enqueue(item(3, "coder"));
        let priorities: Vec<i64> = q.iter().map(|i| i.priority).collect();
        assert_eq!(priorities, vec![5, 3, 1]);
    }

    #[test]
    fn equal_priority_preserves_arrival_order() {
        let mut q = WorkQueue::new();
        let first = item(1, "coder");
        let first_id = first.id;
        q.enqueue(first);
        q.enqueue(item(1, "coder"));
        assert_eq!(q.iter().next().unwrap().id, first_id);
    }

    #[test]
    fn claim_respects_role_substitution() {
        let mut q = WorkQueue::new();
        q.enqueue(item(1, "fixer"));
        let agent = Uuid::new_v4();
        let claimed = q.claim(Role::Coder, agent);
        assert!(claimed.is_some());
    }

    #[test]
    fn claimed_item_carries_agent_and_status() {
        let mut q = WorkQueue::new();
        q.enqueue(item(1, "coder"));
        let agent = Uuid::new_v4();
        let id = q.claim(Role::Coder, agent).unwrap();
        let claimed = q.get(id).unwrap();
        assert_eq!(claimed.assigned_to, Some(agent));
        assert_eq!(claimed.status, WorkStatus::Assigned);
    }

    #[test]
    fn claim_returns_none_when_nothing_matches() {
        let mut q = WorkQueue::new();
        q.enqueue(item(1, "backend"));
        let agent = Uuid::new_v4();
        assert!(q.claim(Role::Frontend, agent).is_none());
    }

    #[test]
    fn complete_requires_matching_agent() {
        let mut q = WorkQueue::new();
        q.enqueue(item(1, "coder"));
        let agent = Uuid::new_v4();
        let work_id = q.claim(Role::Coder, agent).unwrap();
        let other_agent = Uuid::new_v4();
        assert!(q.complete(work_id, other_agent).is_none());
        assert!(q.complete(work_id, agent).is_some());
    }
}
