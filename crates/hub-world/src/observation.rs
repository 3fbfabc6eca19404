// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Observations, conflicts, and the lexical contradiction detector backing
//! `assertFact`.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const MAX_OBSERVATIONS: usize = 500;
const MAX_CONFLICTS: usize = 20;
const CONTRADICTION_WINDOW: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub id: Uuid,
    pub agent: String,
    pub assertion: String,
    pub confidence: f64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub id: Uuid,
    pub a: Uuid,
    pub b: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Lexical negation pairs the detector scans for. Listed both directions
/// so order of appearance in the log doesn't matter.
const NEGATION_PAIRS: &[(&str, &str)] = &[
    ("working", "not working"),
    ("failing", "passing"),
    ("passing", "failing"),
    ("implemented", "not implemented"),
    ("functional", "not functional"),
];

/// Heuristic only — substring matching produces false positives (e.g.
/// "not working on X" collides with "working on Y"). Documented, not
/// fixed: intentional for now.
fn contradicts(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    NEGATION_PAIRS.iter().any(|(pos, neg)| {
        (a.contains(pos) && !a.contains(neg) && b.contains(neg))
            || (b.contains(pos) && !b.contains(neg) && a.contains(neg))
    })
}

#[derive(Debug, Default)]
pub struct ObservationLog {
    observations: VecDeque<Observation>,
    conflicts: VecDeque<Conflict>,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `assertion`, scanning the last 50 observations for a lexical
    /// contradiction first. Returns the new conflict, if one was opened.
    pub fn assert_fact(
        &mut self,
        agent: String,
        assertion: String,
        confidence: f64,
        source: String,
    ) -> (Observation, Option<Conflict>) {
        let mut conflict = None;
        for prior in self.observations.iter().rev().take(CONTRADICTION_WINDOW) {
            if contradicts(&prior.assertion, &assertion) {
                let c = Conflict {
                    id: crate::new_id(),
                    a: prior.id,
                    b: crate::new_id(),
                    description: format!("{:?} contradicts {:?}", prior.assertion, assertion),
                    created_at: crate::clock_now(),
                };
                conflict = Some(c);
                break;
            }
        }

        let observation = Observation {
            id: conflict.as_ref().map(|c| c.b).unwrap_or_else(crate::new_id),
            agent,
            assertion,
            confidence,
            source,
            timestamp: crate::clock_now(),
        };
        if self.observations.len() >= MAX_OBSERVATIONS {
            self.observations.pop_front();
        }
        self.observations.push_back(observation.clone());

        if let Some(ref c) = conflict {
            if self.conflicts.len() >= MAX_CONFLICTS {
                self.conflicts.pop_front();
            }
            self.conflicts.push_back(c.clone());
        }

        (observation, conflict)
    }

    pub fn recent(&self, limit: usize) -> Vec<&Observation> {
        self.observations.iter().rev().take(limit).collect()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    /// True if any observation in the last `limit` entries lowercase-matches
    /// `keyword` with confidence above `min_confidence` (fallback criterion
    /// check in `evaluateGoal`).
    pub fn has_recent_match(&self, keyword: &str, limit: usize, min_confidence: f64) -> bool {
        let keyword = keyword.to_lowercase();
        self.recent(limit)
            .into_iter()
            .any(|o| o.confidence > min_confidence && o.assertion.to_lowercase().contains(&keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contradiction_opens_exactly_one_conflict() {
        let mut log = ObservationLog::new();
        log.assert_fact(
            "a1".to_string(),
            "auth is working".to_string(),
            0.9,
            "test".to_string(),
        );
        let (_, conflict) = log.assert_fact(
            "a2".to_string(),
            "auth is not working".to_string(),
            0.9,
            "test".to_string(),
        );
        assert!(conflict.is_some());
        assert_eq!(log.conflicts().count(), 1);
    }

    #[test]
    fn non_contradicting_assertions_open_no_conflict() {
        let mut log = ObservationLog::new();
        log.assert_fact(
            "a1".to_string(),
            "login endpoint implemented".to_string(),
            0.8,
            "test".to_string(),
        );
        let (_, conflict) = log.assert_fact(
            "a2".to_string(),
            "tests passing".to_string(),
            0.8,
            "test".to_string(),
        );
        assert!(conflict.is_none());
    }

    #[test]
    fn observation_ring_buffer_caps_at_500() {
        let mut log = ObservationLog::new();
        for i in 0..600 {
            log.assert_fact(
                "a".to_string(),
                format!("fact {i}"),
                0.5,
                "test".to_string(),
            );
        }
        assert_eq!(log.recent(10_000).len(), MAX_OBSERVATIONS);
    }
}
