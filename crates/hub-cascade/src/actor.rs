// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Actor wrapper around [`CascadeEngine`], giving contract registration and
//! merge proposals the same single-threaded semantics as the other
//! subsystems.

use tokio::sync::{mpsc, oneshot};

use crate::contract::{Binding, Contract, ContractChange, ContractSpec};
use crate::engine::CascadeEngine;
use crate::log::{CascadeEvent, CascadeSubscriber};
use crate::merge::ProposeChangeResult;

enum Command {
    RegisterContract {
        spec: ContractSpec,
        reply: oneshot::Sender<ContractChange>,
    },
    BindFrontend {
        component_id: String,
        component_name: String,
        endpoint: String,
        fields: Vec<String>,
    },
    GetOutdatedComponents(oneshot::Sender<Vec<Binding>>),
    MarkBindingSynced {
        component_id: String,
        reply: oneshot::Sender<bool>,
    },
    Contracts(oneshot::Sender<Vec<Contract>>),
    JoinFile {
        path: String,
        agent: String,
    },
    LeaveFile {
        path: String,
        agent: String,
    },
    ProposeChange {
        path: String,
        agent: String,
        start: u32,
        end: u32,
        text: String,
        reply: oneshot::Sender<ProposeChangeResult>,
    },
    RecentEvents {
        limit: usize,
        reply: oneshot::Sender<Vec<CascadeEvent>>,
    },
}

#[derive(Clone)]
pub struct CascadeHandle {
    tx: mpsc::Sender<Command>,
}

impl CascadeHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply)).await;
        rx.await.expect("cascade actor dropped reply")
    }

    pub async fn register_contract(&self, spec: ContractSpec) -> ContractChange {
        self.call(|reply| Command::RegisterContract { spec, reply }).await
    }

    pub async fn bind_frontend(
        &self,
        component_id: String,
        component_name: String,
        endpoint: String,
        fields: Vec<String>,
    ) {
        let _ = self
            .tx
            .send(Command::BindFrontend {
                component_id,
                component_name,
                endpoint,
                fields,
            })
            .await;
    }

    pub async fn get_outdated_components(&self) -> Vec<Binding> {
        self.call(Command::GetOutdatedComponents).await
    }

    pub async fn mark_binding_synced(&self, component_id: String) -> bool {
        self.call(|reply| Command::MarkBindingSynced {
            component_id,
            reply,
        })
        .await
    }

    pub async fn contracts(&self) -> Vec<Contract> {
        self.call(Command::Contracts).await
    }

    pub async fn join_file(&self, path: String, agent: String) {
        let _ = self.tx.send(Command::JoinFile { path, agent }).await;
    }

    pub async fn leave_file(&self, path: String, agent: String) {
        let _ = self.tx.send(Command::LeaveFile { path, agent }).await;
    }

    pub async fn propose_change(
        &self,
        path: String,
        agent: String,
        start: u32,
        end: u32,
        text: String,
    ) -> ProposeChangeResult {
        self.call(|reply| Command::ProposeChange {
            path,
            agent,
            start,
            end,
            text,
            reply,
        })
        .await
    }

    pub async fn recent_events(&self, limit: usize) -> Vec<CascadeEvent> {
        self.call(|reply| Command::RecentEvents { limit, reply }).await
    }
}

pub struct CascadeActor {
    engine: CascadeEngine,
    rx: mpsc::Receiver<Command>,
}

impl CascadeActor {
    pub fn spawn(subscriber: Option<Box<dyn CascadeSubscriber>>) -> CascadeHandle {
        let (tx, rx) = mpsc::channel(256);
        let mut engine = CascadeEngine::new();
        if let Some(subscriber) = subscriber {
            engine.subscribe(subscriber);
        }
        let actor = CascadeActor { engine, rx };
        tokio::spawn(actor.run());
        CascadeHandle { tx }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
        }
        tracing::info!("cascade actor channel closed, shutting down");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::RegisterContract { spec, reply } => {
                let _ = reply.send(self.engine.register_contract(spec));
            }
            Command::BindFrontend {
                component_id,
                component_name,
                endpoint,
                fields,
            } => {
                self.engine
                    .bind_frontend(component_id, component_name, endpoint, fields);
            }
            Command::GetOutdatedComponents(reply) => {
                let bindings = self.engine.get_outdated_components().into_iter().cloned().collect();
                let _ = reply.send(bindings);
            }
            Command::MarkBindingSynced { component_id, reply } => {
                let _ = reply.send(self.engine.mark_binding_synced(&component_id));
            }
            Command::Contracts(reply) => {
                let contracts = self.engine.contracts().cloned().collect();
                let _ = reply.send(contracts);
            }
            Command::JoinFile { path, agent } => {
                self.engine.join_file(&path, agent);
            }
            Command::LeaveFile { path, agent } => {
                self.engine.leave_file(&path, &agent);
            }
            Command::ProposeChange {
                path,
                agent,
                start,
                end,
                text,
                reply,
            } => {
                let result = self.engine.propose_change(&path, agent, start, end, text);
                let _ = reply.send(result);
            }
            Command::RecentEvents { limit, reply } => {
                let events = self.engine.recent_events(limit).into_iter().cloned().collect();
                let _ = reply.send(events);
            }
        }
    }
}
