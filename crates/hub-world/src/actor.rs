// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Actor wrapper around [`WorldState`], running the 2s convergence tick as
//! a periodic command on the same loop that serializes all mutations.

use std::time::Duration;

use hub_core::{AgentId, Role, WorkItem};
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::engine::WorldState;
use crate::entities::Patch;
use crate::goal::{EvaluationResult, Goal};
use crate::observation::{Conflict, Observation};

enum Command {
    ApplyPatch {
        patch: Patch,
        reply: oneshot::Sender<u64>,
    },
    AssertFact {
        agent: String,
        assertion: String,
        confidence: f64,
        source: String,
        reporter: AgentId,
        reply: oneshot::Sender<(Observation, Option<Conflict>, u64)>,
    },
    ProposeGoal {
        description: String,
        success_criteria: Vec<String>,
        reporter: AgentId,
        reply: oneshot::Sender<(Uuid, u64)>,
    },
    EvaluateGoal {
        id: Uuid,
        reporter: AgentId,
        reply: oneshot::Sender<Option<EvaluationResult>>,
    },
    EnqueueWork {
        item: WorkItem,
        reply: oneshot::Sender<u64>,
    },
    AssignWork {
        agent_id: AgentId,
        role: Role,
        reply: oneshot::Sender<Option<Uuid>>,
    },
    CompleteWork {
        work_id: Uuid,
        agent_id: AgentId,
        reporter: AgentId,
        reply: oneshot::Sender<Option<EvaluationResult>>,
    },
    ReportFailure {
        area: String,
        reason: String,
        reporter: AgentId,
        reply: oneshot::Sender<u64>,
    },
    Snapshot(oneshot::Sender<(u64, Vec<Goal>)>),
    Tick,
}

#[derive(Clone)]
pub struct WorldHandle {
    tx: mpsc::Sender<Command>,
    version_tx: broadcast::Sender<u64>,
}

impl WorldHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply)).await;
        rx.await.expect("world actor dropped reply")
    }

    pub async fn apply_patch(&self, patch: Patch) -> u64 {
        self.call(|reply| Command::ApplyPatch { patch, reply }).await
    }

    pub async fn assert_fact(
        &self,
        agent: String,
        assertion: String,
        confidence: f64,
        source: String,
        reporter: AgentId,
    ) -> (Observation, Option<Conflict>, u64) {
        self.call(|reply| Command::AssertFact {
            agent,
            assertion,
            confidence,
            source,
            reporter,
            reply,
        })
        .await
    }

    pub async fn propose_goal(
        &self,
        description: String,
        success_criteria: Vec<String>,
        reporter: AgentId,
    ) -> (Uuid, u64) {
        self.call(|reply| Command::ProposeGoal {
            description,
            success_criteria,
            reporter,
            reply,
        })
        .await
    }

    pub async fn evaluate_goal(&self, id: Uuid, reporter: AgentId) -> Option<EvaluationResult> {
        self.call(|reply| Command::EvaluateGoal { id, reporter, reply })
            .await
    }

    pub async fn enqueue_work(&self, item: WorkItem) -> u64 {
        self.call(|reply| Command::EnqueueWork { item, reply }).await
    }

    pub async fn assign_work(&self, agent_id: AgentId, role: Role) -> Option<Uuid> {
        self.call(|reply| Command::AssignWork {
            agent_id,
            role,
            reply,
        })
        .await
    }

    pub async fn complete_work(
        &self,
        work_id: Uuid,
        agent_id: AgentId,
        reporter: AgentId,
    ) -> Option<EvaluationResult> {
        self.call(|reply| Command::CompleteWork {
            work_id,
            agent_id,
            reporter,
            reply,
        })
        .await
    }

    pub async fn report_failure(&self, area: String, reason: String, reporter: AgentId) -> u64 {
        self.call(|reply| Command::ReportFailure {
            area,
            reason,
            reporter,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self) -> (u64, Vec<Goal>) {
        self.call(Command::Snapshot).await
    }

    /// Subscribe to the world-state version bump stream.
    pub fn subscribe_version(&self) -> broadcast::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

pub struct WorldActor {
    state: WorldState,
    rx: mpsc::Receiver<Command>,
    version_tx: broadcast::Sender<u64>,
    /// A synthetic agent id used to attribute system-originated work
    /// (convergence-tick re-evaluation, failure reports) that has no real
    /// caller behind it.
    system_agent: AgentId,
}

impl WorldActor {
    pub fn spawn(tick_interval: Duration) -> WorldHandle {
        let (tx, rx) = mpsc::channel(256);
        let (version_tx, _) = broadcast::channel(256);
        let actor = WorldActor {
            state: WorldState::new(),
            rx,
            version_tx: version_tx.clone(),
            system_agent: Uuid::nil(),
        };
        tokio::spawn(actor.run());

        let tick_tx = tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            loop {
                ticker.tick().await;
                if tick_tx.send(Command::Tick).await.is_err() {
                    break;
                }
            }
        });

        WorldHandle { tx, version_tx }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("world actor channel closed, shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::ApplyPatch { patch, reply } => {
                let _ = reply.send(self.state.apply_patch(patch));
            }
            Command::AssertFact {
                agent,
                assertion,
                confidence,
                source,
                reporter,
                reply,
            } => {
                let _ = reply.send(self.state.assert_fact(agent, assertion, confidence, source, reporter));
            }
            Command::ProposeGoal {
                description,
                success_criteria,
                reporter,
                reply,
            } => {
                let _ = reply.send(self.state.propose_goal(description, success_criteria, reporter));
            }
            Command::EvaluateGoal { id, reporter, reply } => {
                let _ = reply.send(self.state.evaluate_goal(id, reporter).map(|(r, _)| r));
            }
            Command::EnqueueWork { item, reply } => {
                let _ = reply.send(self.state.enqueue_work(item));
            }
            Command::AssignWork {
                agent_id,
                role,
                reply,
            } => {
                let _ = reply.send(self.state.assign_work(agent_id, role).map(|(id, _)| id));
            }
            Command::CompleteWork {
                work_id,
                agent_id,
                reporter,
                reply,
            } => {
                let result = self
                    .state
                    .complete_work(work_id, agent_id, reporter)
                    .and_then(|(evaluation, _)| evaluation);
                let _ = reply.send(result);
            }
            Command::ReportFailure {
                area,
                reason,
                reporter,
                reply,
            } => {
                let _ = reply.send(self.state.report_failure(area, reason, reporter));
            }
            Command::Snapshot(reply) => {
                let goals = self.state.goals().cloned().collect();
                let _ = reply.send((self.state.version(), goals));
            }
            Command::Tick => {
                self.state.tick(self.system_agent);
            }
        }
        self.notify_version();
    }

    fn notify_version(&self) {
        let _ = self.version_tx.send(self.state.version());
    }
}
