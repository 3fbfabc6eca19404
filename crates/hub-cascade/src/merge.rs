// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The OT-lite collaborative text merge demo. Independent from the
//! CRDT doc sessions in `hub-docs`; this is a coarse, deterministic
//! last-write-resolution policy, not a real merge algorithm.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProposedChange {
    pub agent: String,
    pub start: u32,
    pub end: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposeChangeResult {
    pub accepted: bool,
    pub merged_text: String,
    pub conflict: bool,
}

#[derive(Default)]
pub struct FileSession {
    editors: HashSet<String>,
    pending: Vec<ProposedChange>,
}

#[derive(Default)]
pub struct MergeSessions {
    sessions: HashMap<String, FileSession>,
}

fn ranges_overlap(a: (u32, u32), b: (u32, u32)) -> bool {
    !(a.1 <= b.0 || a.0 >= b.1)
}

fn contains(outer: (u32, u32), inner: (u32, u32)) -> bool {
    outer.0 <= inner.0 && outer.1 >= inner.1
}

fn adjacent(a: (u32, u32), b: (u32, u32)) -> bool {
    a.1 == b.0 || b.1 == a.0
}

impl MergeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join_file(&mut self, path: &str, agent: String) {
        self.sessions
            .entry(path.to_string())
            .or_default()
            .editors
            .insert(agent);
    }

    pub fn leave_file(&mut self, path: &str, agent: &str) {
        if let Some(session) = self.sessions.get_mut(path) {
            session.editors.remove(agent);
        }
    }

    /// Apply the overlap/containment/adjacency rules. Returns
    /// the result and whether a cascade `conflict_resolved` event should be
    /// emitted.
    pub fn propose_change(
        &mut self,
        path: &str,
        agent: String,
        start: u32,
        end: u32,
        text: String,
    ) -> ProposeChangeResult {
        let session = self.sessions.entry(path.to_string()).or_default();
        let candidate = (start, end);

        let overlapping = session.pending.iter().find(|p| {
            p.agent != agent
                && (ranges_overlap((p.start, p.end), candidate)
                    || adjacent((p.start, p.end), candidate))
        });

        let result = match overlapping {
            None => ProposeChangeResult {
                accepted: true,
                merged_text: text.clone(),
                conflict: false,
            },
            Some(existing) => {
                let existing_range = (existing.start, existing.end);
                if contains(existing_range, candidate) {
                    ProposeChangeResult {
                        accepted: true,
                        merged_text: existing.text.clone(),
                        conflict: true,
                    }
                } else if contains(candidate, existing_range) {
                    ProposeChangeResult {
                        accepted: true,
                        merged_text: text.clone(),
                        conflict: true,
                    }
                } else if adjacent(existing_range, candidate) {
                    let merged = if existing.start <= start {
                        format!("{}{}", existing.text, text)
                    } else {
                        format!("{}{}", text, existing.text)
                    };
                    ProposeChangeResult {
                        accepted: true,
                        merged_text: merged,
                        conflict: false,
                    }
                } else {
                    let merged = if existing.start <= start {
                        format!("{}{}", existing.text, text)
                    } else {
                        format!("{}{}", text, existing.text)
                    };
                    ProposeChangeResult {
                        accepted: true,
                        merged_text: merged,
                        conflict: true,
                    }
                }
            }
        };

        session.pending.push(ProposedChange {
            agent,
            start,
            end,
            text,
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_overlapping_changes_are_accepted_without_conflict() {
        let mut sessions = MergeSessions::new();
        sessions.join_file("f", "a1".to_string());
        sessions.join_file("f", "a2".to_string());
        let r1 = sessions.propose_change("f", "a1".to_string(), 0, 5, "hi".to_string());
        assert!(r1.accepted && !r1.conflict);
        let r2 = sessions.propose_change("f", "a2".to_string(), 10, 15, "bye".to_string());
        assert!(r2.accepted && !r2.conflict);
    }

    #[test]
    fn containment_rule_outer_wins() {
        let mut sessions = MergeSessions::new();
        sessions.join_file("f", "a1".to_string());
        sessions.join_file("f", "a2".to_string());
        sessions.propose_change("f", "a1".to_string(), 10, 15, "A".to_string());
        let result = sessions.propose_change("f", "a2".to_string(), 12, 14, "B".to_string());
        assert!(result.accepted);
        assert!(result.conflict);
        assert!(result.merged_text.contains('A'));
    }

    #[test]
    fn adjacent_ranges_concatenate_in_start_order() {
        let mut sessions = MergeSessions::new();
        sessions.join_file("f", "a1".to_string());
        sessions.join_file("f", "a2".to_string());
        sessions.propose_change("f", "a1".to_string(), 0, 5, "hello".to_string());
        let result = sessions.propose_change("f", "a2".to_string(), 5, 10, "world".to_string());
        assert_eq!(result.merged_text, "helloworld");
        assert!(!result.conflict);
    }

    #[test]
    fn overlapping_neither_containing_concatenates_and_conflicts() {
        let mut sessions = MergeSessions::new();
        sessions.join_file("f", "a1".to_string());
        sessions.join_file("f", "a2".to_string());
        sessions.propose_change("f", "a1".to_string(), 0, 10, "left".to_string());
        let result = sessions.propose_change("f", "a2".to_string(), 5, 15, "right".to_string());
        assert!(result.conflict);
        assert_eq!(result.merged_text, "leftright");
    }
}
