//! Brick registry
//!
//! Local bricks live in a concurrent map. Misses fall through to an optional
//! [`BrickSource`]; concurrent lookups of the same missing id share one fetch.
//! Brick schemas are compiled on first use and kept until the brick is
//! replaced.

use crate::bricks::{Brick, BrickKind};
use crate::core::registry_id::RegistryId;
use crate::errors::PipelineError;
use crate::schema::{CompiledSchema, SchemaRole};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tracing::debug;

/// Remote or background source of bricks not registered locally
#[async_trait::async_trait]
pub trait BrickSource: Send + Sync {
    /// `Ok(None)` when the source does not know the id
    async fn fetch(&self, id: &RegistryId) -> Result<Option<Arc<dyn Brick>>, PipelineError>;
}

/// A brick together with its resolved kind
#[derive(Clone)]
pub struct TypedBrick {
    pub brick: Arc<dyn Brick>,
    pub kind: BrickKind,
}

type PendingFetch = Arc<OnceCell<Option<Arc<dyn Brick>>>>;

/// Registry for managing bricks
pub struct BrickRegistry {
    bricks: DashMap<RegistryId, Arc<dyn Brick>>,
    pending: DashMap<RegistryId, PendingFetch>,
    schemas: DashMap<(RegistryId, SchemaRole), Arc<CompiledSchema>>,
    typed_cache: RwLock<Option<Arc<HashMap<RegistryId, TypedBrick>>>>,
    source: Option<Arc<dyn BrickSource>>,
}

impl BrickRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            bricks: DashMap::new(),
            pending: DashMap::new(),
            schemas: DashMap::new(),
            typed_cache: RwLock::new(None),
            source: None,
        }
    }

    /// Registry that falls back to `source` for unknown ids
    pub fn with_source(source: Arc<dyn BrickSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new()
        }
    }

    /// Register bricks, replacing any with the same id
    pub fn register(&self, bricks: impl IntoIterator<Item = Arc<dyn Brick>>) {
        for brick in bricks {
            debug!("Registering brick {}", brick.id());
            self.forget_schemas(brick.id());
            self.bricks.insert(brick.id().clone(), brick);
        }
        self.invalidate();
    }

    pub fn register_one(&self, brick: Arc<dyn Brick>) {
        self.register([brick]);
    }

    /// Resolve a brick, consulting the source on a local miss
    pub async fn lookup(&self, id: &RegistryId) -> Result<Arc<dyn Brick>, PipelineError> {
        if let Some(brick) = self.bricks.get(id) {
            return Ok(brick.clone());
        }

        let Some(source) = self.source.clone() else {
            return Err(not_found(id));
        };

        let cell = self
            .pending
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let fetched = cell
            .get_or_try_init(|| async {
                debug!("Fetching brick {} from source", id);
                source.fetch(id).await
            })
            .await;

        let fetched = match fetched {
            Ok(fetched) => fetched.clone(),
            Err(e) => {
                // Failed fetches are retried by the next lookup
                self.forget_pending(id, &cell);
                return Err(e);
            }
        };

        let result = match fetched {
            Some(brick) => {
                if !self.bricks.contains_key(id) {
                    self.bricks.insert(id.clone(), brick.clone());
                    self.invalidate();
                }
                Ok(brick)
            }
            None => Err(not_found(id)),
        };

        // A resolved fetch is not reused; a later miss asks the source again
        self.forget_pending(id, &cell);
        result
    }

    /// Compiled input or output schema of `brick`
    ///
    /// `None` when the brick declares no schema for `role`.
    pub fn compiled_schema(&self, brick: &dyn Brick, role: SchemaRole) -> Option<Arc<CompiledSchema>> {
        let schema = match role {
            SchemaRole::Input => brick.input_schema(),
            SchemaRole::Output => brick.output_schema()?,
        };
        let compiled = self
            .schemas
            .entry((brick.id().clone(), role))
            .or_insert_with(|| Arc::new(CompiledSchema::compile(schema)))
            .clone();
        Some(compiled)
    }

    /// Local lookup only
    pub fn get(&self, id: &RegistryId) -> Option<Arc<dyn Brick>> {
        self.bricks.get(id).map(|brick| brick.clone())
    }

    pub fn contains(&self, id: &RegistryId) -> bool {
        self.bricks.contains_key(id)
    }

    /// Every local brick with its kind, cached until the registry changes
    pub fn all_typed(&self) -> Arc<HashMap<RegistryId, TypedBrick>> {
        if let Ok(cache) = self.typed_cache.read() {
            if let Some(typed) = cache.as_ref() {
                return typed.clone();
            }
        }

        // Built under the write lock so a concurrent invalidation cannot be
        // overwritten by an older snapshot
        match self.typed_cache.write() {
            Ok(mut cache) => {
                if let Some(typed) = cache.as_ref() {
                    return typed.clone();
                }
                let typed = Arc::new(self.build_typed());
                *cache = Some(typed.clone());
                typed
            }
            Err(_) => Arc::new(self.build_typed()),
        }
    }

    fn build_typed(&self) -> HashMap<RegistryId, TypedBrick> {
        self.bricks
            .iter()
            .map(|entry| {
                let brick = entry.value().clone();
                let kind = brick.kind();
                (entry.key().clone(), TypedBrick { brick, kind })
            })
            .collect()
    }

    /// Sorted ids of local bricks
    pub fn ids(&self) -> Vec<RegistryId> {
        let mut ids: Vec<RegistryId> = self.bricks.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.bricks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bricks.is_empty()
    }

    /// Remove every brick, pending fetch and cache
    pub fn clear(&self) {
        self.bricks.clear();
        self.pending.clear();
        self.schemas.clear();
        self.invalidate();
    }

    fn forget_pending(&self, id: &RegistryId, cell: &PendingFetch) {
        self.pending.remove_if(id, |_, pending| Arc::ptr_eq(pending, cell));
    }

    fn forget_schemas(&self, id: &RegistryId) {
        self.schemas.remove(&(id.clone(), SchemaRole::Input));
        self.schemas.remove(&(id.clone(), SchemaRole::Output));
    }

    fn invalidate(&self) {
        if let Ok(mut cache) = self.typed_cache.write() {
            *cache = None;
        }
    }
}

impl Default for BrickRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &RegistryId) -> PipelineError {
    PipelineError::BrickNotFound { id: id.to_string() }
}
