// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic editor color assignment: an 8-entry fixed
//! palette indexed by a stable hash of the agent id, so a reconnecting
//! editor keeps the same color.

use std::hash::{Hash, Hasher};

use uuid::Uuid;

const PALETTE: [&str; 8] = [
    "#e06c75", "#61afef", "#98c379", "#e5c07b", "#c678dd", "#56b6c2", "#d19a66", "#abb2bf",
];

pub fn color_for(agent_id: Uuid) -> &'static str {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    agent_id.hash(&mut hasher);
    let idx = (hasher.finish() as usize) % PALETTE.len();
    PALETTE[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_stable_for_same_id() {
        let id = Uuid::new_v4();
        assert_eq!(color_for(id), color_for(id));
    }
}
