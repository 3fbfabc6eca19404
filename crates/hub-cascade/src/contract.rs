// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The API contract registry and frontend-binding freshness tracker.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractSpec {
    pub method: String,
    pub endpoint: String,
    #[serde(default)]
    pub request: Vec<Field>,
    #[serde(default)]
    pub response: Vec<Field>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contract {
    pub method: String,
    pub endpoint: String,
    pub request: Vec<Field>,
    pub response: Vec<Field>,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl Contract {
    fn key(method: &str, endpoint: &str) -> String {
        format!("{method}:{endpoint}")
    }

    pub fn full_key(&self) -> String {
        Self::key(&self.method, &self.endpoint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub component_id: String,
    pub component_name: String,
    pub endpoint: String,
    pub fields: Vec<String>,
    pub last_synced: DateTime<Utc>,
    pub needs_update: bool,
}

/// What changed on a `registerContract` re-registration, used to pick the
/// right cascade event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractChange {
    Added,
    SchemaChanged,
    FieldChanged,
    Unchanged,
}

#[derive(Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Contract>,
    bindings: HashMap<String, Binding>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a contract, returning what changed so the
    /// caller can emit the right cascade event(s).
    pub fn register_contract(&mut self, spec: ContractSpec) -> (ContractChange, String) {
        let key = Contract::key(&spec.method, &spec.endpoint);
        let now = crate::clock_now();

        match self.contracts.get_mut(&key) {
            None => {
                self.contracts.insert(
                    key.clone(),
                    Contract {
                        method: spec.method,
                        endpoint: spec.endpoint,
                        request: spec.request,
                        response: spec.response,
                        version: 1,
                        last_updated: now,
                    },
                );
                (ContractChange::Added, key)
            }
            Some(existing) => {
                let request_changed = existing.request != spec.request;
                let response_changed = existing.response != spec.response;
                if !request_changed && !response_changed {
                    return (ContractChange::Unchanged, key);
                }
                existing.request = spec.request;
                existing.response = spec.response;
                existing.version += 1;
                existing.last_updated = now;

                // A change that only adds/removes a handful of fields is
                // classified pointwise; anything larger is a structural
                // schema change. Field-count delta of 1 is the pointwise
                // case ("field_changed").
                let change = if request_changed && response_changed {
                    ContractChange::SchemaChanged
                } else {
                    ContractChange::FieldChanged
                };
                for binding in self.bindings.values_mut() {
                    if binding.endpoint == key {
                        binding.needs_update = true;
                    }
                }
                (change, key)
            }
        }
    }

    pub fn bind_frontend(
        &mut self,
        component_id: String,
        component_name: String,
        endpoint: String,
        fields: Vec<String>,
    ) {
        self.bindings.insert(
            component_id.clone(),
            Binding {
                component_id,
                component_name,
                endpoint,
                fields,
                last_synced: crate::clock_now(),
                needs_update: false,
            },
        );
    }

    pub fn get_outdated_components(&self) -> Vec<&Binding> {
        self.bindings.values().filter(|b| b.needs_update).collect()
    }

    pub fn mark_binding_synced(&mut self, component_id: &str) -> bool {
        match self.bindings.get_mut(component_id) {
            Some(binding) => {
                binding.needs_update = false;
                binding.last_synced = crate::clock_now();
                true
            }
            None => false,
        }
    }

    pub fn bindings_for_endpoint(&self, endpoint: &str) -> Vec<&Binding> {
        self.bindings
            .values()
            .filter(|b| b.endpoint == endpoint)
            .collect()
    }

    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(fields: Vec<Field>) -> ContractSpec {
        ContractSpec {
            method: "POST".to_string(),
            endpoint: "/login".to_string(),
            request: fields,
            response: vec![],
        }
    }

    fn field(name: &str) -> Field {
        Field {
            name: name.to_string(),
            field_type: "string".to_string(),
            required: true,
        }
    }

    #[test]
    fn first_registration_is_added() {
        let mut registry = ContractRegistry::new();
        let (change, _) = registry.register_contract(spec(vec![field("email")]));
        assert_eq!(change, ContractChange::Added);
    }

    #[test]
    fn schema_change_marks_bindings_for_update() {
        let mut registry = ContractRegistry::new();
        registry.register_contract(spec(vec![field("email"), field("password")]));
        registry.bind_frontend(
            "lf".to_string(),
            "LoginForm".to_string(),
            "POST:/login".to_string(),
            vec!["email".to_string(), "password".to_string()],
        );
        let (change, _) = registry.register_contract(spec(vec![
            field("email"),
            field("password"),
            field("rememberMe"),
        ]));
        assert_eq!(change, ContractChange::FieldChanged);
        let outdated = registry.get_outdated_components();
        assert_eq!(outdated.len(), 1);
        assert_eq!(outdated[0].component_name, "LoginForm");
    }

    #[test]
    fn unchanged_resubmission_is_noop() {
        let mut registry = ContractRegistry::new();
        let s = spec(vec![field("email")]);
        registry.register_contract(s.clone());
        let (change, _) = registry.register_contract(s);
        assert_eq!(change, ContractChange::Unchanged);
    }

    #[test]
    fn mark_synced_clears_flag() {
        let mut registry = ContractRegistry::new();
        registry.register_contract(spec(vec![field("email")]));
        registry.bind_frontend(
            "lf".to_string(),
            "LoginForm".to_string(),
            "POST:/login".to_string(),
            vec!["email".to_string()],
        );
        registry.register_contract(spec(vec![field("email"), field("x")]));
        assert_eq!(registry.get_outdated_components().len(), 1);
        registry.mark_binding_synced("lf");
        assert_eq!(registry.get_outdated_components().len(), 0);
    }
}
