//! Run context - variables visible to templates

use crate::errors::PipelineError;
use crate::persistence::{ModComponentRef, ModStateStore, StateNamespace};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Entry arguments of a run
pub const INPUT_VAR: &str = "@input";
/// Mod-level configured options
pub const OPTIONS_VAR: &str = "@options";
/// Mod-scoped persisted state
pub const MOD_VAR: &str = "@mod";

/// Variable name an output key is bound to
pub fn output_key_var(output_key: &str) -> String {
    format!("@{}", output_key)
}

/// Immutable mapping from `@name` to value
///
/// Extending a context produces a new one; contexts captured earlier (for
/// example by a nested pipeline) keep seeing the variables they were built
/// with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    vars: Arc<Map<String, Value>>,
}

impl RunContext {
    /// Context holding `@input` and `@options`
    pub fn new(input: Value, options_args: Value) -> Self {
        let mut vars = Map::new();
        vars.insert(INPUT_VAR.to_string(), input);
        vars.insert(OPTIONS_VAR.to_string(), options_args);
        Self { vars: Arc::new(vars) }
    }

    pub fn from_map(vars: Map<String, Value>) -> Self {
        Self { vars: Arc::new(vars) }
    }

    /// New context with one more binding
    pub fn with_var(&self, name: impl Into<String>, value: Value) -> Self {
        self.with_vars([(name.into(), value)])
    }

    /// New context with additional bindings; later bindings win
    pub fn with_vars(&self, vars: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut next = (*self.vars).clone();
        next.extend(vars);
        Self { vars: Arc::new(next) }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// `@input`, or `null` when absent
    pub fn input(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.vars.get(INPUT_VAR).unwrap_or(&NULL)
    }

    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.vars).clone())
    }

    /// Object templates are rendered against
    ///
    /// `flatten` puts the fields of an object `working_output` beneath the
    /// context variables. `mod_state`, when present, is bound as `@mod`.
    pub fn render_scope(&self, flatten: Option<&Value>, mod_state: Option<Value>) -> Value {
        let mut scope = Map::new();
        if let Some(Value::Object(fields)) = flatten {
            scope.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        scope.extend(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(state) = mod_state {
            scope.insert(MOD_VAR.to_string(), state);
        }
        Value::Object(scope)
    }
}

/// Run-scoped, lazily fetched snapshot of mod state backing `@mod`
///
/// The first access reads the store; every later access in the same run
/// (nested pipelines included) sees that same snapshot.
#[derive(Debug, Clone, Default)]
pub struct ModVariable {
    snapshot: Arc<OnceCell<Value>>,
}

impl ModVariable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        store: &dyn ModStateStore,
        mod_component: &ModComponentRef,
    ) -> Result<Value, PipelineError> {
        self.snapshot
            .get_or_try_init(|| async {
                debug!("Fetching mod state for {:?}", mod_component.mod_id);
                store
                    .get_state(StateNamespace::Mod, mod_component)
                    .await
                    .map_err(|e| PipelineError::unknown(format!("Failed to read mod state: {:#}", e)))
            })
            .await
            .cloned()
    }

    /// Snapshot, if it was already fetched
    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.get()
    }
}
