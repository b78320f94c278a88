//! Mod state persistence
//!
//! The runtime only reads mod state when materialising `@mod`; writes go
//! through the state bricks. Concurrent writers race with last-write-wins.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStateStore;

use crate::core::registry_id::RegistryId;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Which slice of state a read or write addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateNamespace {
    /// Shared by every component of the same mod
    #[default]
    Mod,
    /// Visible only to one mod component
    Private,
    /// Shared by everything on the page
    Shared,
}

impl fmt::Display for StateNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateNamespace::Mod => write!(f, "mod"),
            StateNamespace::Private => write!(f, "private"),
            StateNamespace::Shared => write!(f, "shared"),
        }
    }
}

impl std::str::FromStr for StateNamespace {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mod" | "blueprint" => Ok(StateNamespace::Mod),
            "private" | "extension" => Ok(StateNamespace::Private),
            "shared" => Ok(StateNamespace::Shared),
            other => Err(format!("Unknown state namespace: {}", other)),
        }
    }
}

/// How new data combines with existing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Replace,
    #[default]
    Shallow,
    Deep,
}

/// Identifies the mod component a run belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModComponentRef {
    /// Owning mod, absent for standalone components
    pub mod_id: Option<RegistryId>,
    pub mod_component_id: Uuid,
    pub starter_brick_id: Option<RegistryId>,
}

impl ModComponentRef {
    pub fn new(mod_id: Option<RegistryId>) -> Self {
        Self {
            mod_id,
            mod_component_id: Uuid::new_v4(),
            starter_brick_id: None,
        }
    }
}

/// Storage key for a namespace/component pair
pub fn state_key(namespace: StateNamespace, mod_component: &ModComponentRef) -> String {
    match namespace {
        StateNamespace::Shared => "shared".to_string(),
        StateNamespace::Private => format!("private:{}", mod_component.mod_component_id),
        StateNamespace::Mod => match &mod_component.mod_id {
            Some(mod_id) => format!("mod:{}", mod_id),
            // Standalone components have no mod to share with
            None => format!("private:{}", mod_component.mod_component_id),
        },
    }
}

/// Combine `data` into `previous` according to `strategy`
pub fn merge_state(previous: &Value, data: Value, strategy: MergeStrategy) -> Value {
    match strategy {
        MergeStrategy::Replace => data,
        MergeStrategy::Shallow => match (previous, data) {
            (Value::Object(previous), Value::Object(data)) => {
                let mut merged = previous.clone();
                merged.extend(data);
                Value::Object(merged)
            }
            (_, data) => data,
        },
        MergeStrategy::Deep => deep_merge(previous, data),
    }
}

fn deep_merge(previous: &Value, data: Value) -> Value {
    match (previous, data) {
        (Value::Object(previous), Value::Object(data)) => {
            let mut merged: Map<String, Value> = previous.clone();
            for (key, value) in data {
                let combined = match merged.get(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, combined);
            }
            Value::Object(merged)
        }
        (_, data) => data,
    }
}

/// Backend for mod/page state
#[async_trait::async_trait]
pub trait ModStateStore: Send + Sync {
    /// Current state, `{}` when nothing was stored
    async fn get_state(
        &self,
        namespace: StateNamespace,
        mod_component: &ModComponentRef,
    ) -> Result<Value>;

    /// Merge `data` into the stored state and return the new state
    async fn set_state(
        &self,
        namespace: StateNamespace,
        data: Value,
        merge_strategy: MergeStrategy,
        mod_component: &ModComponentRef,
    ) -> Result<Value>;
}

/// In-memory state store (for tests or ephemeral runs)
pub struct InMemoryStateStore {
    states: tokio::sync::RwLock<HashMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ModStateStore for InMemoryStateStore {
    async fn get_state(
        &self,
        namespace: StateNamespace,
        mod_component: &ModComponentRef,
    ) -> Result<Value> {
        let states = self.states.read().await;
        Ok(states
            .get(&state_key(namespace, mod_component))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    async fn set_state(
        &self,
        namespace: StateNamespace,
        data: Value,
        merge_strategy: MergeStrategy,
        mod_component: &ModComponentRef,
    ) -> Result<Value> {
        let key = state_key(namespace, mod_component);
        let mut states = self.states.write().await;
        let previous = states.get(&key).cloned().unwrap_or_else(|| Value::Object(Map::new()));
        let next = merge_state(&previous, data, merge_strategy);
        states.insert(key, next.clone());
        Ok(next)
    }
}
