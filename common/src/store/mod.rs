//! Entity storage
//!
//! [`EntityStore`] is the raw key-value contract the back-ends implement.
//! Handlers never write to it directly: they open a [`StoreTransaction`] from
//! the shared [`EntityDb`], read and stage entities on it, and either commit
//! everything in one batch or drop it and leave the store untouched.

pub mod dashmap;
pub mod fjall;
pub mod in_memory;

use crate::entities::Entity;
use crate::types::EntityId;
use anyhow::{bail, Result};
use async_trait::async_trait;
use config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

pub use self::dashmap::DashMapEntityStore;
pub use self::fjall::FjallEntityStore;
pub use self::in_memory::InMemoryEntityStore;

const DEFAULT_STORE: &str = "memory";

/// One staged entity write
#[derive(Debug, Clone)]
pub struct EntityWrite {
    pub table: &'static str,
    pub id: EntityId,
    pub value: Vec<u8>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Raw value of an entity, if present
    async fn get(&self, table: &'static str, id: &EntityId) -> Result<Option<Vec<u8>>>;

    /// Apply a batch of writes atomically
    async fn apply(&self, writes: Vec<EntityWrite>) -> Result<()>;

    /// Number of entities in a table
    async fn count(&self, table: &'static str) -> Result<usize>;
}

/// Shared handle to the entity store, serialising writers across modules
#[derive(Clone)]
pub struct EntityDb {
    store: Arc<dyn EntityStore>,
    writer: Arc<Mutex<()>>,
}

impl EntityDb {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Open the back-end named by the `store` key
    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = config.get_string("store").unwrap_or(DEFAULT_STORE.to_string());
        let store: Arc<dyn EntityStore> = match kind.as_str() {
            "memory" => Arc::new(InMemoryEntityStore::new()),
            "dashmap" => Arc::new(DashMapEntityStore::new()),
            "fjall" => Arc::new(FjallEntityStore::new(config)?),
            _ => bail!("Unknown entity store type '{kind}'"),
        };
        info!("Using entity store '{kind}'");
        Ok(Self::new(store))
    }

    /// Start a transaction; waits for any other writer to finish
    pub async fn begin(&self) -> StoreTransaction {
        StoreTransaction {
            store: self.store.clone(),
            staged: HashMap::new(),
            _guard: self.writer.clone().lock_owned().await,
        }
    }

    /// Committed value of an entity, for queries
    pub async fn get_in<E: Entity>(&self, scope: E::Scope, id: &EntityId) -> Result<Option<E>> {
        match self.store.get(E::table(scope), id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get<E: Entity<Scope = ()>>(&self, id: &EntityId) -> Result<Option<E>> {
        self.get_in((), id).await
    }

    pub async fn count_in<E: Entity>(&self, scope: E::Scope) -> Result<usize> {
        self.store.count(E::table(scope)).await
    }
}

/// Staged writes of one event handler
///
/// Reads see the transaction's own staged writes first.  Nothing reaches the
/// store until [`StoreTransaction::commit`]; dropping the transaction discards
/// every staged write.
pub struct StoreTransaction {
    store: Arc<dyn EntityStore>,
    staged: HashMap<(&'static str, EntityId), Vec<u8>>,
    _guard: OwnedMutexGuard<()>,
}

impl StoreTransaction {
    pub async fn get_in<E: Entity>(&self, scope: E::Scope, id: &EntityId) -> Result<Option<E>> {
        let table = E::table(scope);
        if let Some(bytes) = self.staged.get(&(table, id.clone())) {
            return Ok(Some(serde_json::from_slice(bytes)?));
        }
        match self.store.get(table, id).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn get<E: Entity<Scope = ()>>(&self, id: &EntityId) -> Result<Option<E>> {
        self.get_in((), id).await
    }

    pub async fn exists_in<E: Entity>(&self, scope: E::Scope, id: &EntityId) -> Result<bool> {
        let table = E::table(scope);
        if self.staged.contains_key(&(table, id.clone())) {
            return Ok(true);
        }
        Ok(self.store.get(table, id).await?.is_some())
    }

    /// Stage an entity, replacing any previous value with the same id
    pub fn set<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let value = serde_json::to_vec(entity)?;
        self.staged.insert((E::table(entity.scope()), entity.id().clone()), value);
        Ok(())
    }

    /// Number of distinct entities staged
    pub fn staged(&self) -> usize {
        self.staged.len()
    }

    /// Persist all staged writes in one batch, returning how many were written
    pub async fn commit(self) -> Result<usize> {
        let writes: Vec<EntityWrite> = self
            .staged
            .into_iter()
            .map(|((table, id), value)| EntityWrite { table, id, value })
            .collect();
        let count = writes.len();
        if count > 0 {
            self.store.apply(writes).await?;
        }
        Ok(count)
    }
}
