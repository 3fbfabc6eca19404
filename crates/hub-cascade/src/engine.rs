// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Ties the contract registry, the OT-lite merge sessions, and the cascade
//! event log together.

use serde_json::json;

use crate::contract::{Binding, Contract, ContractChange, ContractRegistry, ContractSpec};
use crate::log::{CascadeEvent, CascadeLog, CascadeSubscriber};
use crate::merge::{MergeSessions, ProposeChangeResult};

#[derive(Default)]
pub struct CascadeEngine {
    registry: ContractRegistry,
    merges: MergeSessions,
    log: CascadeLog,
}

impl CascadeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Box<dyn CascadeSubscriber>) {
        self.log.subscribe(subscriber);
    }

    pub fn register_contract(&mut self, spec: ContractSpec) -> ContractChange {
        let endpoint = format!("{}:{}", spec.method, spec.endpoint);
        let (change, key) = self.registry.register_contract(spec);

        match change {
            ContractChange::Added => {
                self.log.publish(CascadeEvent::new(
                    "endpoint_added",
                    "cascade",
                    &key,
                    json!({"endpoint": key}),
                ));
            }
            ContractChange::SchemaChanged | ContractChange::FieldChanged => {
                let event_type = if change == ContractChange::SchemaChanged {
                    "contract_changed"
                } else {
                    "field_changed"
                };
                self.log.publish(CascadeEvent::new(
                    event_type,
                    "cascade",
                    &key,
                    json!({"endpoint": key}),
                ));
                let affected: Vec<String> = self
                    .registry
                    .bindings_for_endpoint(&key)
                    .into_iter()
                    .map(|b| b.component_id.clone())
                    .collect();
                for component_id in affected {
                    self.log.publish(CascadeEvent::new(
                        "frontend_adapted",
                        &key,
                        &component_id,
                        json!({"componentId": component_id}),
                    ));
                }
            }
            ContractChange::Unchanged => {}
        }
        let _ = endpoint;
        change
    }

    pub fn bind_frontend(
        &mut self,
        component_id: String,
        component_name: String,
        endpoint: String,
        fields: Vec<String>,
    ) {
        self.registry
            .bind_frontend(component_id, component_name, endpoint, fields);
    }

    pub fn get_outdated_components(&self) -> Vec<&Binding> {
        self.registry.get_outdated_components()
    }

    pub fn mark_binding_synced(&mut self, component_id: &str) -> bool {
        self.registry.mark_binding_synced(component_id)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.registry.contracts()
    }

    pub fn join_file(&mut self, path: &str, agent: String) {
        self.merges.join_file(path, agent);
    }

    pub fn leave_file(&mut self, path: &str, agent: &str) {
        self.merges.leave_file(path, agent);
    }

    pub fn propose_change(
        &mut self,
        path: &str,
        agent: String,
        start: u32,
        end: u32,
        text: String,
    ) -> ProposeChangeResult {
        let result = self.merges.propose_change(path, agent.clone(), start, end, text);
        if result.conflict {
            self.log.publish(CascadeEvent::new(
                "conflict_resolved",
                &agent,
                path,
                json!({"mergedText": result.merged_text}),
            ));
        }
        result
    }

    pub fn recent_events(&self, limit: usize) -> Vec<&CascadeEvent> {
        self.log.recent(limit)
    }

    pub fn last_event(&self) -> Option<&CascadeEvent> {
        self.log.last()
    }
}
