// libs/shared/store/src/memory.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duplicate row id {0}")]
    DuplicateKey(Uuid),

    #[error("row {0} not found")]
    RowMissing(Uuid),

    #[error("row payload error: {0}")]
    Serialization(String),
}

type Tables = HashMap<String, HashMap<Uuid, Value>>;

/// Embedded transactional document store.
///
/// Rows are JSON documents keyed by id in named tables, all behind a single
/// write lock: every mutation runs inside a [`MemoryStore::with_write`]
/// closure, so a multi-table change (appointment insert plus slot flip)
/// commits or fails as one unit. Check-then-insert sequences that span an
/// await point additionally serialize per provider through
/// [`MemoryStore::provider_lock`].
pub struct MemoryStore {
    tables: RwLock<Tables>,
    provider_locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Mutable view over all tables for the duration of one write closure.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl Transaction<'_> {
    pub fn insert(&mut self, table: &str, id: Uuid, row: Value) -> Result<(), StoreError> {
        let rows = self.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }
        rows.insert(id, row);
        Ok(())
    }

    pub fn get(&self, table: &str, id: Uuid) -> Option<Value> {
        self.tables.get(table).and_then(|rows| rows.get(&id)).cloned()
    }

    /// Shallow-merge an object patch into an existing row. Keys present in
    /// the patch overwrite the stored value, nulls included.
    pub fn merge(&mut self, table: &str, id: Uuid, patch: Value) -> Result<Value, StoreError> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Serialization(format!(
                    "patch must be a JSON object, got {}",
                    other
                )))
            }
        };

        let row = self
            .tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or(StoreError::RowMissing(id))?;

        match row {
            Value::Object(fields) => {
                for (key, value) in patch {
                    fields.insert(key, value);
                }
                Ok(row.clone())
            }
            other => Err(StoreError::Serialization(format!(
                "stored row is not a JSON object: {}",
                other
            ))),
        }
    }

    pub fn remove(&mut self, table: &str, id: Uuid) -> bool {
        self.tables
            .get_mut(table)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            provider_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Run `f` with exclusive access to every table. This is the transaction
    /// boundary: nothing else observes intermediate state. There is no
    /// rollback, so closures must validate first and mutate last.
    pub async fn with_write<T, E: From<StoreError>>(
        &self,
        f: impl FnOnce(&mut Transaction) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tables = self.tables.write().await;
        let mut tx = Transaction {
            tables: &mut tables,
        };
        f(&mut tx)
    }

    pub async fn insert(&self, table: &str, id: Uuid, row: Value) -> Result<(), StoreError> {
        self.with_write(|tx| tx.insert(table, id, row)).await
    }

    pub async fn get(&self, table: &str, id: Uuid) -> Option<Value> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|rows| rows.get(&id)).cloned()
    }

    /// Snapshot of all rows matching `filter`. Row order is unspecified;
    /// callers sort.
    pub async fn select(&self, table: &str, filter: impl Fn(&Value) -> bool) -> Vec<Value> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|rows| rows.values().filter(|row| filter(row)).cloned().collect())
            .unwrap_or_default()
    }

    pub async fn merge(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, StoreError> {
        self.with_write(|tx| tx.merge(table, id, patch)).await
    }

    pub async fn remove(&self, table: &str, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        tables
            .get_mut(table)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false)
    }

    /// Serialize writers on one provider's timeline. The guard must be held
    /// across the whole check-then-insert sequence.
    pub async fn provider_lock(&self, provider_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.provider_locks.lock().unwrap();
            locks
                .entry(provider_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        debug!("acquiring timeline lock for provider {}", provider_id);
        lock.lock_owned().await
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
