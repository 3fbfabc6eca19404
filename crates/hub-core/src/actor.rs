// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The workspace actor: owns the single [`WorkspaceStore`] instance and
//! serializes every mutation through one `mpsc` command channel. Sweepers
//! are modeled as periodic commands fed into the same channel rather than
//! as separate tasks touching the store directly, so the store never needs
//! its own lock.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::error::ToolError;
use crate::model::{Agent, AgentId, AgentStatus, Handoff, Intent, IntentAction, Lock, Role, WorkItem};
use crate::store::WorkspaceStore;

type Reply<T> = oneshot::Sender<Result<T, ToolError>>;

/// Commands accepted by the workspace actor. One variant per public
/// [`WorkspaceStore`] operation, plus the two sweeper ticks.
enum Command {
    JoinWorkspace {
        name: String,
        client: String,
        role: Role,
        autonomous: bool,
        reply: Reply<(Agent, u64)>,
    },
    ListAgents(oneshot::Sender<Vec<Agent>>),
    TouchAgent {
        id: AgentId,
        reply: Reply<()>,
    },
    SetTarget {
        target: String,
        agent_id: AgentId,
        reply: Reply<u64>,
    },
    GetTarget(oneshot::Sender<Option<String>>),
    PostIntent {
        agent_id: AgentId,
        action: IntentAction,
        description: String,
        reply: Reply<u64>,
    },
    ReadIntents {
        limit: usize,
        reply: oneshot::Sender<Vec<Intent>>,
    },
    LockFile {
        path: String,
        agent_id: AgentId,
        ttl: Duration,
        reason: Option<String>,
        reply: Reply<u64>,
    },
    RenewLock {
        path: String,
        agent_id: AgentId,
        ttl: Duration,
        reply: Reply<u64>,
    },
    CheckLocks(oneshot::Sender<Vec<Lock>>),
    UnlockFile {
        path: String,
        agent_id: AgentId,
        handoff: Option<(Role, String)>,
        reply: Reply<u64>,
    },
    EnqueueWork {
        item: WorkItem,
        reply: oneshot::Sender<u64>,
    },
    PollWork {
        role: Role,
        reply: oneshot::Sender<Option<WorkItem>>,
    },
    ClaimWork {
        role: Role,
        agent_id: AgentId,
        reply: Reply<WorkItem>,
    },
    CompleteWork {
        work_id: Uuid,
        agent_id: AgentId,
        reply: Reply<Option<Uuid>>,
    },
    TakeHandoffForRole {
        role: Role,
        reply: oneshot::Sender<Option<Handoff>>,
    },
    ListWork(oneshot::Sender<Vec<WorkItem>>),
    SweepLocks,
    SweepPresence,
    Version(oneshot::Sender<u64>),
}

/// Handle to a running [`WorkspaceActor`], cheaply cloneable and `Send`.
#[derive(Clone)]
pub struct WorkspaceHandle {
    tx: mpsc::Sender<Command>,
    /// Fan-out of the hub-wide version counter, bumped whenever the store
    /// mutates. Every long-poll subscriber gets its own
    /// receiver via `subscribe`.
    version_tx: broadcast::Sender<u64>,
}

impl WorkspaceHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ToolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ToolError::Internal("workspace actor stopped".to_string()))?;
        rx.await
            .map_err(|_| ToolError::Internal("workspace actor dropped reply".to_string()))?
    }

    async fn call_infallible<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply)).await;
        rx.await.expect("workspace actor dropped reply")
    }

    pub async fn join_workspace(
        &self,
        name: String,
        client: String,
        role: Role,
        autonomous: bool,
    ) -> Result<(Agent, u64), ToolError> {
        self.call(|reply| Command::JoinWorkspace {
            name,
            client,
            role,
            autonomous,
            reply,
        })
        .await
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.call_infallible(Command::ListAgents).await
    }

    pub async fn touch_agent(&self, id: AgentId) -> Result<(), ToolError> {
        self.call(|reply| Command::TouchAgent { id, reply }).await
    }

    pub async fn set_target(&self, target: String, agent_id: AgentId) -> Result<u64, ToolError> {
        self.call(|reply| Command::SetTarget {
            target,
            agent_id,
            reply,
        })
        .await
    }

    pub async fn get_target(&self) -> Option<String> {
        self.call_infallible(Command::GetTarget).await
    }

    pub async fn post_intent(
        &self,
        agent_id: AgentId,
        action: IntentAction,
        description: String,
    ) -> Result<u64, ToolError> {
        self.call(|reply| Command::PostIntent {
            agent_id,
            action,
            description,
            reply,
        })
        .await
    }

    pub async fn read_intents(&self, limit: usize) -> Vec<Intent> {
        self.call_infallible(|reply| Command::ReadIntents { limit, reply })
            .await
    }

    pub async fn lock_file(
        &self,
        path: String,
        agent_id: AgentId,
        ttl: Duration,
        reason: Option<String>,
    ) -> Result<u64, ToolError> {
        self.call(|reply| Command::LockFile {
            path,
            agent_id,
            ttl,
            reason,
            reply,
        })
        .await
    }

    pub async fn renew_lock(
        &self,
        path: String,
        agent_id: AgentId,
        ttl: Duration,
    ) -> Result<u64, ToolError> {
        self.call(|reply| Command::RenewLock {
            path,
            agent_id,
            ttl,
            reply,
        })
        .await
    }

    pub async fn check_locks(&self) -> Vec<Lock> {
        self.call_infallible(Command::CheckLocks).await
    }

    pub async fn unlock_file(
        &self,
        path: String,
        agent_id: AgentId,
        handoff: Option<(Role, String)>,
    ) -> Result<u64, ToolError> {
        self.call(|reply| Command::UnlockFile {
            path,
            agent_id,
            handoff,
            reply,
        })
        .await
    }

    pub async fn enqueue_work(&self, item: WorkItem) -> u64 {
        self.call_infallible(|reply| Command::EnqueueWork { item, reply })
            .await
    }

    pub async fn poll_work(&self, role: Role) -> Option<WorkItem> {
        self.call_infallible(|reply| Command::PollWork { role, reply })
            .await
    }

    pub async fn claim_work(&self, role: Role, agent_id: AgentId) -> Result<WorkItem, ToolError> {
        self.call(|reply| Command::ClaimWork {
            role,
            agent_id,
            reply,
        })
        .await
    }

    pub async fn complete_work(
        &self,
        work_id: Uuid,
        agent_id: AgentId,
    ) -> Result<Option<Uuid>, ToolError> {
        self.call(|reply| Command::CompleteWork {
            work_id,
            agent_id,
            reply,
        })
        .await
    }

    pub async fn take_handoff_for_role(&self, role: Role) -> Option<Handoff> {
        self.call_infallible(|reply| Command::TakeHandoffForRole { role, reply })
            .await
    }

    /// Snapshot of every pending/assigned/completed work item, used by the
    /// `/graph?format=widget` diagnostic view.
    pub async fn list_work(&self) -> Vec<WorkItem> {
        self.call_infallible(Command::ListWork).await
    }

    pub async fn version(&self) -> u64 {
        self.call_infallible(Command::Version).await
    }

    /// Subscribe to the hub-wide version bump stream, used by the
    /// long-poll `/changes` endpoint and the SSE bridge.
    pub fn subscribe_version(&self) -> broadcast::Receiver<u64> {
        self.version_tx.subscribe()
    }
}

pub struct WorkspaceActor {
    store: WorkspaceStore,
    rx: mpsc::Receiver<Command>,
    version_tx: broadcast::Sender<u64>,
    presence_disconnect_after: Duration,
    presence_remove_after: Duration,
}

/// Sweeper periods and thresholds the actor needs at spawn time, mirroring
/// `hub_config::Timings` without hub-core depending on hub-config.
pub struct SweepTimings {
    pub lock_sweep_interval: Duration,
    pub presence_sweep_interval: Duration,
    pub presence_disconnect_after: Duration,
    pub presence_remove_after: Duration,
}

impl WorkspaceActor {
    /// Spawn the actor task and its two sweeper timers, returning a
    /// [`WorkspaceHandle`] for the rest of the process to use.
    pub fn spawn(timings: SweepTimings) -> WorkspaceHandle {
        let (tx, rx) = mpsc::channel(256);
        let (version_tx, _) = broadcast::channel(256);
        let handle = WorkspaceHandle {
            tx: tx.clone(),
            version_tx: version_tx.clone(),
        };

        let actor = WorkspaceActor {
            store: WorkspaceStore::new(),
            rx,
            version_tx,
            presence_disconnect_after: timings.presence_disconnect_after,
            presence_remove_after: timings.presence_remove_after,
        };
        let lock_sweep_interval = timings.lock_sweep_interval;
        let presence_sweep_interval = timings.presence_sweep_interval;
        tokio::spawn(actor.run());

        let lock_tx = tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(lock_sweep_interval);
            loop {
                ticker.tick().await;
                if lock_tx.send(Command::SweepLocks).await.is_err() {
                    break;
                }
            }
        });

        let presence_tx = tx;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(presence_sweep_interval);
            loop {
                ticker.tick().await;
                if presence_tx.send(Command::SweepPresence).await.is_err() {
                    break;
                }
            }
        });

        handle
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("workspace actor channel closed, shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::JoinWorkspace {
                name,
                client,
                role,
                autonomous,
                reply,
            } => {
                let result = self.store.join_workspace(name, client, role, autonomous);
                self.notify_version();
                let _ = reply.send(Ok(result));
            }
            Command::ListAgents(reply) => {
                let agents = self.store.list_agents().into_iter().cloned().collect();
                let _ = reply.send(agents);
            }
            Command::TouchAgent { id, reply } => {
                let result = self.store.touch_agent(id);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::SetTarget {
                target,
                agent_id,
                reply,
            } => {
                let result = self.store.set_target(target, agent_id);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::GetTarget(reply) => {
                let _ = reply.send(self.store.get_target().map(str::to_string));
            }
            Command::PostIntent {
                agent_id,
                action,
                description,
                reply,
            } => {
                let result = self.store.post_intent(agent_id, action, description);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::ReadIntents { limit, reply } => {
                let intents = self
                    .store
                    .read_intents(limit)
                    .into_iter()
                    .cloned()
                    .collect();
                let _ = reply.send(intents);
            }
            Command::LockFile {
                path,
                agent_id,
                ttl,
                reason,
                reply,
            } => {
                let result = self.store.lock_file(path, agent_id, ttl, reason);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::RenewLock {
                path,
                agent_id,
                ttl,
                reply,
            } => {
                let result = self.store.renew_lock(&path, agent_id, ttl);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::CheckLocks(reply) => {
                let locks = self.store.check_locks().into_iter().cloned().collect();
                let _ = reply.send(locks);
            }
            Command::UnlockFile {
                path,
                agent_id,
                handoff,
                reply,
            } => {
                let result = self.store.unlock_file(&path, agent_id, handoff);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::EnqueueWork { item, reply } => {
                let v = self.store.enqueue_work(item);
                self.notify_version();
                let _ = reply.send(v);
            }
            Command::PollWork { role, reply } => {
                let _ = reply.send(self.store.poll_work(role).cloned());
            }
            Command::ClaimWork {
                role,
                agent_id,
                reply,
            } => {
                let result = self.store.claim_work(role, agent_id).cloned();
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::CompleteWork {
                work_id,
                agent_id,
                reply,
            } => {
                let result = self.store.complete_work(work_id, agent_id);
                self.notify_version();
                let _ = reply.send(result);
            }
            Command::TakeHandoffForRole { role, reply } => {
                let _ = reply.send(self.store.take_handoff_for_role(role));
            }
            Command::ListWork(reply) => {
                let items = self.store.list_work().into_iter().cloned().collect();
                let _ = reply.send(items);
            }
            Command::SweepLocks => {
                let expired = self.store.sweep_expired_locks();
                if !expired.is_empty() {
                    tracing::info!(count = expired.len(), paths = ?expired, "expired locks swept");
                    self.notify_version();
                }
            }
            Command::SweepPresence => {
                let removed = self.store.sweep_presence(
                    self.presence_disconnect_after,
                    self.presence_remove_after,
                );
                if !removed.is_empty() {
                    tracing::info!(count = removed.len(), "stale agents removed");
                    self.notify_version();
                }
            }
            Command::Version(reply) => {
                let _ = reply.send(self.store.version());
            }
        }
    }

    fn notify_version(&self) {
        let _ = self.version_tx.send(self.store.version());
    }
}
