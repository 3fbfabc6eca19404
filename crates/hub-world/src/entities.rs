// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The five entity tables of the belief graph: files, endpoints (keyed
//! `METHOD:route`), UI elements, flows,
//! and tests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileEntity {
    pub path: String,
    pub description: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointEntity {
    pub route: String,
    pub method: String,
    pub implemented: bool,
    pub tested: bool,
    pub failing: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiElementEntity {
    pub name: String,
    pub functional: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FlowEntity {
    pub name: String,
    pub working: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestEntity {
    pub name: String,
    pub covers: Vec<String>,
    pub passing: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The five keyed tables making up the belief graph.
#[derive(Debug, Default, Serialize)]
pub struct EntityTables {
    pub files: HashMap<String, FileEntity>,
    pub endpoints: HashMap<String, EndpointEntity>,
    pub ui_elements: HashMap<String, UiElementEntity>,
    pub flows: HashMap<String, FlowEntity>,
    pub tests: HashMap<String, TestEntity>,
}

/// A partial update to one or more entity tables, as accepted by
/// `applyPatch`: for each table and key, `null` deletes, an
/// object upserts a shallow merge with the existing entry or defaults.
#[derive(Debug, Default, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub files: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub endpoints: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub ui_elements: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub flows: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub tests: HashMap<String, Option<Value>>,
}

impl EntityTables {
    /// Apply a patch, stamping `last_updated` on every touched key even
    /// when the merged value is unchanged — this is caller-observable
    /// activity by design, not a bug.
    pub fn apply_patch(&mut self, patch: Patch) {
        let now = crate::clock_now();
        apply_table(&mut self.files, patch.files, now);
        apply_table(&mut self.endpoints, patch.endpoints, now);
        apply_table(&mut self.ui_elements, patch.ui_elements, now);
        apply_table(&mut self.flows, patch.flows, now);
        apply_table(&mut self.tests, patch.tests, now);
    }
}

fn apply_table<T>(table: &mut HashMap<String, T>, updates: HashMap<String, Option<Value>>, now: DateTime<Utc>)
where
    T: Default + Serialize + for<'de> Deserialize<'de> + HasLastUpdated,
{
    for (key, value) in updates {
        match value {
            None => {
                table.remove(&key);
            }
            Some(value) => {
                let mut merged = match table.remove(&key) {
                    Some(existing) => merge_json(existing, &value),
                    None => merge_json(T::default(), &value),
                };
                merged.set_last_updated(now);
                table.insert(key, merged);
            }
        }
    }
}

/// Shallow-merge `patch` JSON fields onto `base` by round-tripping through
/// `serde_json::Value`. Sufficient for the flat entity shapes here; a
/// future nested entity would need a real merge visitor.
fn merge_json<T>(base: T, patch: &Value) -> T
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut base_value = serde_json::to_value(&base).unwrap_or(Value::Null);
    if let (Value::Object(base_obj), Value::Object(patch_obj)) = (&mut base_value, patch) {
        for (k, v) in patch_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(base_value).unwrap_or(base)
}

pub trait HasLastUpdated {
    fn set_last_updated(&mut self, when: DateTime<Utc>);
}

macro_rules! impl_has_last_updated {
    ($t:ty) => {
        impl HasLastUpdated for $t {
            fn set_last_updated(&mut self, when: DateTime<Utc>) {
                self.last_updated = Some(when);
            }
        }
    };
}

impl_has_last_updated!(FileEntity);
impl_has_last_updated!(EndpointEntity);
impl_has_last_updated!(UiElementEntity);
impl_has_last_updated!(FlowEntity);
impl_has_last_updated!(TestEntity);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_upserts_and_stamps_last_updated() {
        let mut tables = EntityTables::default();
        let mut patch = Patch::default();
        patch.endpoints.insert(
            "POST:/login".to_string(),
            Some(json!({"route": "/login", "method": "POST", "implemented": true})),
        );
        tables.apply_patch(patch);
        let endpoint = tables.endpoints.get("POST:/login").unwrap();
        assert!(endpoint.implemented);
        assert!(endpoint.last_updated.is_some());
    }

    #[test]
    fn patch_null_deletes() {
        let mut tables = EntityTables::default();
        tables.files.insert("a.rs".to_string(), FileEntity::default());
        let mut patch = Patch::default();
        patch.files.insert("a.rs".to_string(), None);
        tables.apply_patch(patch);
        assert!(!tables.files.contains_key("a.rs"));
    }
}
