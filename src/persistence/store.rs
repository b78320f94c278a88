//! SQLite-based mod state store

use crate::persistence::{merge_state, state_key, MergeStrategy, ModComponentRef, ModStateStore, StateNamespace};
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// SQLite mod state store
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (creating if needed) a store at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("brick-runtime");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        Self::new(&db_dir.join("state.db")).await
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mod_state (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize state table")?;

        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT data FROM mod_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load state")?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("Corrupt state for {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM mod_state ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list state keys")?;

        Ok(rows.iter().map(|row| row.get::<String, _>("key")).collect())
    }
}

#[async_trait::async_trait]
impl ModStateStore for SqliteStateStore {
    async fn get_state(
        &self,
        namespace: StateNamespace,
        mod_component: &ModComponentRef,
    ) -> Result<Value> {
        Ok(self
            .load(&state_key(namespace, mod_component))
            .await?
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
        let previous = self
            .load(&key)
            .await?
            .unwrap_or_else(|| Value::Object(Map::new()));
        let next = merge_state(&previous, data, merge_strategy);

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO mod_state (key, data, updated_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&key)
        .bind(serde_json::to_string(&next)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save state")?;

        Ok(next)
    }
}
