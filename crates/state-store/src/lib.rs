use std::collections::HashMap;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use types::{TelemetryValue, ValueKind};

/// Metadata recorded the first time a state key is seen.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMeta {
    pub description: String,
    pub unit: String,
    pub kind: ValueKind,
}

impl StateMeta {
    pub fn new(description: impl Into<String>, unit: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            description: description.into(),
            unit: unit.into(),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("state {0} is not registered")]
    NotRegistered(String),
    #[error("value encode error: {0}")]
    Encode(serde_json::Error),
    #[error("stored value for {key} is unreadable: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored kind {kind:?} for {key} is unknown")]
    UnknownKind { key: String, kind: String },
}

/// Key/value state persistence with change-suppressed acknowledgement.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Creates the state if absent. Existing metadata is left untouched.
    async fn ensure_registered(&self, key: &str, meta: &StateMeta) -> Result<(), StoreError>;

    /// Last acknowledged value, if any.
    async fn get_last(&self, key: &str) -> Result<Option<TelemetryValue>, StoreError>;

    /// Unconditionally writes `value` and marks it acknowledged.
    async fn acknowledge(&self, key: &str, value: &TelemetryValue) -> Result<(), StoreError>;

    /// Writes `value` only when it differs from the last acknowledged value.
    /// Returns whether a write happened.
    async fn set_if_changed(&self, key: &str, value: &TelemetryValue) -> Result<bool, StoreError> {
        if self.get_last(key).await?.as_ref() == Some(value) {
            return Ok(false);
        }
        self.acknowledge(key, value).await?;
        Ok(true)
    }
}

#[derive(Debug, Clone)]
struct MemoryState {
    meta: StateMeta,
    value: Option<TelemetryValue>,
    ack_count: u64,
}

/// Process-local store, used when no database path is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<String, MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn meta(&self, key: &str) -> Option<StateMeta> {
        self.states.lock().await.get(key).map(|state| state.meta.clone())
    }

    /// Number of acknowledged writes for `key`.
    pub async fn ack_count(&self, key: &str) -> u64 {
        self.states
            .lock()
            .await
            .get(key)
            .map(|state| state.ack_count)
            .unwrap_or(0)
    }

    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.lock().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn ensure_registered(&self, key: &str, meta: &StateMeta) -> Result<(), StoreError> {
        self.states
            .lock()
            .await
            .entry(key.to_string())
            .or_insert_with(|| MemoryState {
                meta: meta.clone(),
                value: None,
                ack_count: 0,
            });
        Ok(())
    }

    async fn get_last(&self, key: &str) -> Result<Option<TelemetryValue>, StoreError> {
        Ok(self
            .states
            .lock()
            .await
            .get(key)
            .and_then(|state| state.value.clone()))
    }

    async fn acknowledge(&self, key: &str, value: &TelemetryValue) -> Result<(), StoreError> {
        let mut states = self.states.lock().await;
        let state = states
            .get_mut(key)
            .ok_or_else(|| StoreError::NotRegistered(key.to_string()))?;
        state.value = Some(value.clone());
        state.ack_count += 1;
        Ok(())
    }
}

/// SQLite-backed store so change suppression survives restarts.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&sqlite_url(path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS states (\
                key TEXT PRIMARY KEY,\
                description TEXT NOT NULL,\
                unit TEXT NOT NULL,\
                kind TEXT NOT NULL,\
                value TEXT,\
                acked_at INTEGER\
            )",
        )
        .execute(&pool)
        .await?;

        info!(path = %path, "state store initialized");

        Ok(Self { pool })
    }

    pub async fn meta(&self, key: &str) -> Result<Option<StateMeta>, StoreError> {
        let row = sqlx::query("SELECT description, unit, kind FROM states WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let kind = row.get::<String, _>("kind");
        let Some(parsed) = ValueKind::parse(&kind) else {
            return Err(StoreError::UnknownKind {
                key: key.to_string(),
                kind,
            });
        };
        Ok(Some(StateMeta {
            description: row.get::<String, _>("description"),
            unit: row.get::<String, _>("unit"),
            kind: parsed,
        }))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn state_count(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM states")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn ensure_registered(&self, key: &str, meta: &StateMeta) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO states (key, description, unit, kind) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(&meta.description)
        .bind(&meta.unit)
        .bind(meta.kind.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            debug!(key, kind = meta.kind.as_str(), "state registered");
        }
        Ok(())
    }

    async fn get_last(&self, key: &str) -> Result<Option<TelemetryValue>, StoreError> {
        let row = sqlx::query("SELECT value FROM states WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(raw) = row.and_then(|row| row.get::<Option<String>, _>("value")) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    async fn acknowledge(&self, key: &str, value: &TelemetryValue) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value).map_err(StoreError::Encode)?;
        let result = sqlx::query("UPDATE states SET value = ?, acked_at = ? WHERE key = ?")
            .bind(encoded)
            .bind(unix_ms())
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotRegistered(key.to_string()));
        }
        Ok(())
    }
}

fn sqlite_url(path: &str) -> String {
    if path.starts_with("sqlite:") {
        path.to_string()
    } else {
        format!("sqlite://{path}")
    }
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
