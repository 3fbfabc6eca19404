// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The belief graph and convergence engine: entity tables, observations,
//! conflicts, goals, and goal-driven work scheduling.

pub mod actor;
pub mod engine;
pub mod entities;
pub mod goal;
pub mod observation;

pub use actor::{WorldActor, WorldHandle};
pub use engine::{WorldSnapshot, WorldState};
pub use entities::{EndpointEntity, EntityTables, FileEntity, FlowEntity, Patch, TestEntity, UiElementEntity};
pub use goal::{EvaluationResult, Goal, GoalStatus};
pub use observation::{Conflict, Observation, ObservationLog};

pub(crate) fn clock_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

pub(crate) fn new_id() -> uuid::Uuid {
    uuid::Uuid::new_v4()
}
