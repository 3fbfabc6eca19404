// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Goals and the criterion-classification evaluator backing
//! `proposeGoal`/`evaluateGoal`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::EntityTables;
use crate::observation::ObservationLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Converging,
    Satisfied,
    Regressed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Goal {
    pub id: Uuid,
    pub description: String,
    pub success_criteria: Vec<String>,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(description: String, success_criteria: Vec<String>) -> Self {
        Self {
            id: crate::new_id(),
            description,
            success_criteria,
            status: GoalStatus::Pending,
            created_at: crate::clock_now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub satisfied: bool,
    pub progress: f64,
    pub missing: Vec<String>,
}

/// Classify and check a single success criterion against the belief graph
/// by keyword.
fn check_criterion(criterion: &str, entities: &EntityTables, observations: &ObservationLog) -> bool {
    let lower = criterion.to_lowercase();
    let is_endpoint = lower.contains("endpoint") || lower.contains("api");
    if is_endpoint && lower.contains("implemented") {
        return entities
            .endpoints
            .values()
            .any(|e| e.implemented && route_matches(&lower, &e.route));
    }
    if is_endpoint && lower.contains("tested") {
        return entities
            .endpoints
            .values()
            .any(|e| e.tested && route_matches(&lower, &e.route));
    }
    if lower.contains("test") && lower.contains("pass") {
        return !entities.tests.is_empty() && entities.tests.values().all(|t| t.passing);
    }
    if lower.contains("ui") || lower.contains("frontend") {
        return entities.ui_elements.values().any(|u| u.functional);
    }
    if lower.contains("flow") || lower.contains("working") {
        return entities.flows.values().any(|f| f.working);
    }
    observations.has_recent_match(&lower, 20, 0.7)
}

fn route_matches(criterion: &str, route: &str) -> bool {
    criterion.contains(&route.to_lowercase())
}

impl Goal {
    /// Evaluate every success criterion, updating `self.status` per the
    /// goal state machine. Returns the evaluation plus whether the
    /// status actually changed (callers bump version only then).
    pub fn evaluate(
        &mut self,
        entities: &EntityTables,
        observations: &ObservationLog,
    ) -> (EvaluationResult, bool) {
        let missing: Vec<String> = self
            .success_criteria
            .iter()
            .filter(|c| !check_criterion(c, entities, observations))
            .cloned()
            .collect();
        let total = self.success_criteria.len().max(1) as f64;
        let progress = (total - missing.len() as f64) / total;

        let previous = self.status;
        let new_status = if missing.is_empty() {
            GoalStatus::Satisfied
        } else if progress > 0.5 {
            GoalStatus::Converging
        } else if matches!(previous, GoalStatus::Satisfied | GoalStatus::Converging) {
            GoalStatus::Regressed
        } else {
            GoalStatus::InProgress
        };

        let changed = new_status != previous;
        self.status = new_status;

        (
            EvaluationResult {
                satisfied: missing.is_empty(),
                progress,
                missing,
            },
            changed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EndpointEntity, TestEntity};

    #[test]
    fn goal_satisfied_when_no_missing_criteria() {
        let mut entities = EntityTables::default();
        entities.endpoints.insert(
            "POST:/auth/login".to_string(),
            EndpointEntity {
                route: "/auth/login".to_string(),
                method: "POST".to_string(),
                implemented: true,
                ..Default::default()
            },
        );
        entities.tests.insert(
            "t1".to_string(),
            TestEntity {
                name: "t1".to_string(),
                covers: vec!["POST:/auth/login".to_string()],
                passing: true,
                ..Default::default()
            },
        );
        let observations = ObservationLog::new();
        let mut goal = Goal::new(
            "Build auth".to_string(),
            vec![
                "POST /auth/login endpoint implemented".to_string(),
                "Tests passing".to_string(),
            ],
        );
        let (result, changed) = goal.evaluate(&entities, &observations);
        assert!(result.satisfied);
        assert_eq!(result.missing.len(), 0);
        assert!(changed);
        assert_eq!(goal.status, GoalStatus::Satisfied);
    }

    #[test]
    fn goal_in_progress_with_no_matches() {
        let entities = EntityTables::default();
        let observations = ObservationLog::new();
        let mut goal = Goal::new(
            "Build auth".to_string(),
            vec!["POST /auth/login implemented".to_string()],
        );
        let (result, _changed) = goal.evaluate(&entities, &observations);
        assert!(!result.satisfied);
        assert_eq!(goal.status, GoalStatus::InProgress);
    }

    #[test]
    fn goal_regresses_after_previously_satisfied() {
        let mut entities = EntityTables::default();
        entities.endpoints.insert(
            "POST:/x".to_string(),
            EndpointEntity {
                route: "/x".to_string(),
                implemented: true,
                ..Default::default()
            },
        );
        let observations = ObservationLog::new();
        let mut goal = Goal::new("g".to_string(), vec!["endpoint /x implemented".to_string()]);
        let (_r, _c) = goal.evaluate(&entities, &observations);
        assert_eq!(goal.status, GoalStatus::Satisfied);

        entities.endpoints.get_mut("POST:/x").unwrap().implemented = false;
        let (result, changed) = goal.evaluate(&entities, &observations);
        assert!(!result.satisfied);
        assert!(changed);
        assert_eq!(goal.status, GoalStatus::Regressed);
    }
}
