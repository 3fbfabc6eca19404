// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The world state: belief graph entity tables, goals, observations,
//! conflicts, and the shared work queue.

use std::collections::HashMap;

use hub_core::{AgentId, Role, WorkItem, WorkQueue};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{EntityTables, Patch};
use crate::goal::{EvaluationResult, Goal, GoalStatus};
use crate::observation::{Conflict, Observation, ObservationLog};

#[derive(Debug, Serialize)]
pub struct WorldSnapshot<'a> {
    pub version: u64,
    pub entities: &'a EntityTables,
    pub goals: Vec<&'a Goal>,
    pub conflicts: Vec<&'a Conflict>,
}

#[derive(Default)]
pub struct WorldState {
    entities: EntityTables,
    goals: HashMap<Uuid, Goal>,
    observations: ObservationLog,
    queue: WorkQueue,
    version: u64,
}

impl WorldState {
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

    pub fn apply_patch(&mut self, patch: Patch) -> u64 {
        self.entities.apply_patch(patch);
        self.bump()
    }

    pub fn entities(&self) -> &EntityTables {
        &self.entities
    }

    /// Appends an observation and, on detecting a lexical contradiction,
    /// opens a conflict and enqueues `tester` work at priority 10.
    pub fn assert_fact(
        &mut self,
        agent: String,
        assertion: String,
        confidence: f64,
        source: String,
        reporter: AgentId,
    ) -> (Observation, Option<Conflict>, u64) {
        let (observation, conflict) = self.observations.assert_fact(agent, assertion, confidence, source);
        if let Some(ref c) = conflict {
            self.queue.enqueue(WorkItem::new(
                format!("resolve conflict: {}", c.description),
                "tester".to_string(),
                reporter,
                None,
                10,
                None,
            ));
        }
        (observation, conflict, self.bump())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.observations.conflicts()
    }

    /// Creates a `pending` goal and enqueues a `planner`-role work item at
    /// priority 10 with `goal_id` set.
    pub fn propose_goal(
        &mut self,
        description: String,
        success_criteria: Vec<String>,
        reporter: AgentId,
    ) -> (Uuid, u64) {
        let goal = Goal::new(description.clone(), success_criteria);
        let id = goal.id;
        self.goals.insert(id, goal);
        self.queue.enqueue(WorkItem::new(
            format!("plan: {description}"),
            "planner".to_string(),
            reporter,
            None,
            10,
            Some(id),
        ));
        (id, self.bump())
    }

    pub fn get_goal(&self, id: Uuid) -> Option<&Goal> {
        self.goals.get(&id)
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    /// Evaluates `id`'s success criteria, transitioning its status. On a
    /// regression, enqueues up to 3 missing criteria as `fixer`-role work
    /// at priority 8.
    pub fn evaluate_goal(&mut self, id: Uuid, reporter: AgentId) -> Option<(EvaluationResult, u64)> {
        let goal = self.goals.get_mut(&id)?;
        let (result, changed) = goal.evaluate(&self.entities, &self.observations);
        let regressed = changed && goal.status == GoalStatus::Regressed;
        let missing_for_fixer: Vec<String> = result.missing.iter().take(3).cloned().collect();

        if regressed {
            for criterion in missing_for_fixer {
                self.queue.enqueue(WorkItem::new(
                    format!("fix regression: {criterion}"),
                    "fixer".to_string(),
                    reporter,
                    None,
                    8,
                    Some(id),
                ));
            }
        }

        let version = if changed { self.bump() } else { self.version };
        Some((result, version))
    }

    // ---- work queue (shared with hub-core's WorkQueue type) -----------

    pub fn enqueue_work(&mut self, item: WorkItem) -> u64 {
        self.queue.enqueue(item);
        self.bump()
    }

    /// Maps the requester's role to acceptable work roles (`coder` also
    /// drains `fixer`-labeled work and vice versa) and claims the first
    /// match.
    pub fn assign_work(&mut self, agent_id: AgentId, role: Role) -> Option<(Uuid, u64)> {
        let id = self.queue.claim(role, agent_id)?;
        Some((id, self.bump()))
    }

    /// Marks a work item completed and re-evaluates its associated goal,
    /// if any.
    pub fn complete_work(
        &mut self,
        work_id: Uuid,
        agent_id: AgentId,
        reporter: AgentId,
    ) -> Option<(Option<EvaluationResult>, u64)> {
        let goal_id = self.queue.complete(work_id, agent_id)?;
        self.bump();
        let evaluation = match goal_id {
            Some(goal_id) => self.evaluate_goal(goal_id, reporter).map(|(r, _)| r),
            None => None,
        };
        Some((evaluation, self.version))
    }

    /// Asserts a failure, marks matching endpoints `failing=true`, and
    /// enqueues `fixer` work at priority 9.
    pub fn report_failure(&mut self, area: String, reason: String, reporter: AgentId) -> u64 {
        self.observations.assert_fact(
            "system".to_string(),
            format!("{area} failing: {reason}"),
            0.9,
            "report_failure".to_string(),
        );
        for endpoint in self.entities.endpoints.values_mut() {
            if endpoint.route.contains(&area) || area.contains(&endpoint.route) {
                endpoint.failing = true;
                endpoint.last_updated = Some(crate::clock_now());
            }
        }
        self.queue.enqueue(WorkItem::new(
            format!("fix {area}: {reason}"),
            "fixer".to_string(),
            reporter,
            None,
            9,
            None,
        ));
        self.bump()
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Convergence tick: re-evaluate non-satisfied goals,
    /// retire completed work older than 60s, and requeue work stuck
    /// `assigned` for more than 30s.
    pub fn tick(&mut self, system_agent: AgentId) {
        let pending_ids: Vec<Uuid> = self
            .goals
            .iter()
            .filter(|(_, g)| g.status != GoalStatus::Satisfied)
            .map(|(id, _)| *id)
            .collect();
        for id in pending_ids {
            self.evaluate_goal(id, system_agent);
        }
        let retired = self.queue.retire_completed();
        let requeued = self.queue.retry_stuck();
        if retired > 0 || !requeued.is_empty() {
            if !requeued.is_empty() {
                tracing::info!(count = requeued.len(), "stuck work items requeued");
            }
            self.bump();
        }
    }
}
