// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Actor wrapper around [`DocManager`], giving every mutation the
//! single-threaded semantics the session GC timers and broadcast ordering
//! depend on.

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::DocError;
use crate::manager::{CreateResult, DocManager, GC_DELAY};
use crate::session::{Awareness, AwarenessPatch, ChannelId, Frame, SessionMeta};

type Reply<T> = oneshot::Sender<Result<T, DocError>>;

enum Command {
    Create {
        path: String,
        initial: Option<String>,
        reply: oneshot::Sender<CreateResult>,
    },
    Join {
        path: String,
        channel: ChannelId,
        agent_id: Uuid,
        name: String,
        role: String,
        environment: Option<String>,
        sender: mpsc::UnboundedSender<Frame>,
        reply: oneshot::Sender<Option<(Vec<u8>, Vec<Awareness>)>>,
    },
    Leave {
        path: String,
        channel: ChannelId,
        agent_id: Option<Uuid>,
    },
    Gc {
        path: String,
        generation: u64,
    },
    ApplyUpdate {
        path: String,
        bytes: Vec<u8>,
        sender: ChannelId,
        reply: Reply<()>,
    },
    UpdateAwareness {
        path: String,
        agent_id: Uuid,
        patch: AwarenessPatch,
        reply: Reply<()>,
    },
    Snapshot {
        path: String,
        reply: oneshot::Sender<Option<Vec<u8>>>,
    },
    TextContent {
        path: String,
        reply: oneshot::Sender<Option<String>>,
    },
    ListSessions(oneshot::Sender<Vec<SessionMeta>>),
}

#[derive(Clone)]
pub struct DocHandle {
    tx: mpsc::Sender<Command>,
}

impl DocHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, DocError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DocError::NotFound("doc actor stopped".to_string()))?;
        rx.await
            .map_err(|_| DocError::NotFound("doc actor dropped reply".to_string()))?
    }

    async fn call_infallible<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply)).await;
        rx.await.expect("doc actor dropped reply")
    }

    pub async fn create(&self, path: String, initial: Option<String>) -> CreateResult {
        self.call_infallible(|reply| Command::Create {
            path,
            initial,
            reply,
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn join(
        &self,
        path: String,
        channel: ChannelId,
        agent_id: Uuid,
        name: String,
        role: String,
        environment: Option<String>,
        sender: mpsc::UnboundedSender<Frame>,
    ) -> Option<(Vec<u8>, Vec<Awareness>)> {
        self.call_infallible(|reply| Command::Join {
            path,
            channel,
            agent_id,
            name,
            role,
            environment,
            sender,
            reply,
        })
        .await
    }

    pub async fn leave(&self, path: String, channel: ChannelId, agent_id: Option<Uuid>) {
        let _ = self.tx.send(Command::Leave {
            path,
            channel,
            agent_id,
        }).await;
    }

    pub async fn apply_update(
        &self,
        path: String,
        bytes: Vec<u8>,
        sender: ChannelId,
    ) -> Result<(), DocError> {
        self.call(|reply| Command::ApplyUpdate {
            path,
            bytes,
            sender,
            reply,
        })
        .await
    }

    pub async fn update_awareness(
        &self,
        path: String,
        agent_id: Uuid,
        patch: AwarenessPatch,
    ) -> Result<(), DocError> {
        self.call(|reply| Command::UpdateAwareness {
            path,
            agent_id,
            patch,
            reply,
        })
        .await
    }

    pub async fn snapshot(&self, path: String) -> Option<Vec<u8>> {
        self.call_infallible(|reply| Command::Snapshot { path, reply })
            .await
    }

    pub async fn text_content(&self, path: String) -> Option<String> {
        self.call_infallible(|reply| Command::TextContent { path, reply })
            .await
    }

    pub async fn list_sessions(&self) -> Vec<SessionMeta> {
        self.call_infallible(Command::ListSessions).await
    }
}

pub struct DocActor {
    manager: DocManager,
    rx: mpsc::Receiver<Command>,
    self_tx: mpsc::Sender<Command>,
}

impl DocActor {
    pub fn spawn() -> DocHandle {
        let (tx, rx) = mpsc::channel(256);
        let actor = DocActor {
            manager: DocManager::new(),
            rx,
            self_tx: tx.clone(),
        };
        tokio::spawn(actor.run());
        DocHandle { tx }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("doc actor channel closed, shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Create {
                path,
                initial,
                reply,
            } => {
                let _ = reply.send(self.manager.create(path, initial));
            }
            Command::Join {
                path,
                channel,
                agent_id,
                name,
                role,
                environment,
                sender,
                reply,
            } => {
                let result = self
                    .manager
                    .join(&path, channel, agent_id, name, role, environment, sender);
                let _ = reply.send(result);
            }
            Command::Leave {
                path,
                channel,
                agent_id,
            } => {
                if let Some(generation) = self.manager.leave(&path, channel, agent_id) {
                    let gc_tx = self.self_tx.clone();
                    tokio::spawn(async move {
                        sleep(GC_DELAY).await;
                        let _ = gc_tx.send(Command::Gc { path, generation }).await;
                    });
                }
            }
            Command::Gc { path, generation } => {
                if self.manager.gc_if_still_empty(&path, generation) {
                    tracing::debug!(path, "doc session garbage collected");
                }
            }
            Command::ApplyUpdate {
                path,
                bytes,
                sender,
                reply,
            } => {
                let _ = reply.send(self.manager.apply_update(&path, bytes, sender));
            }
            Command::UpdateAwareness {
                path,
                agent_id,
                patch,
                reply,
            } => {
                let _ = reply.send(self.manager.update_awareness(&path, agent_id, patch));
            }
            Command::Snapshot { path, reply } => {
                let _ = reply.send(self.manager.snapshot(&path));
            }
            Command::TextContent { path, reply } => {
                let _ = reply.send(self.manager.text_content(&path));
            }
            Command::ListSessions(reply) => {
                let _ = reply.send(self.manager.list_sessions());
            }
        }
    }
}
