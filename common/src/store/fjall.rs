//! On-disk entity store using Fjall, one keyspace per table

use super::{EntityStore, EntityWrite};
use crate::types::EntityId;
use anyhow::Result;
use async_trait::async_trait;
use config::Config;
use ::dashmap::DashMap;
use ::fjall::{Database, Keyspace, KeyspaceCreateOptions, PersistMode};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

const DEFAULT_DATABASE_PATH: &str = "fjall-entities";
const DEFAULT_CLEAR_ON_START: bool = false;
const DEFAULT_FLUSH_EVERY: i64 = 100;

pub struct FjallEntityStore {
    database: Database,
    keyspaces: DashMap<&'static str, Keyspace>,
    batch_counter: AtomicUsize,
    flush_every: usize,
}

impl FjallEntityStore {
    pub fn new(config: &Config) -> Result<Self> {
        let path = config
            .get_string("database-path")
            .unwrap_or(DEFAULT_DATABASE_PATH.to_string());
        let clear = config.get_bool("clear-on-start").unwrap_or(DEFAULT_CLEAR_ON_START);
        info!("Storing entities with Fjall on disk ({path})");
        let path = Path::new(&path);

        if clear && path.exists() {
            fs::remove_dir_all(path)?;
        }

        let database = Database::builder(path).open()?;
        let flush_every = config.get_int("flush-every").unwrap_or(DEFAULT_FLUSH_EVERY);

        Ok(Self {
            database,
            keyspaces: DashMap::new(),
            batch_counter: AtomicUsize::new(0),
            flush_every: flush_every.max(0) as usize,
        })
    }

    fn keyspace(&self, table: &'static str) -> Result<Keyspace> {
        if let Some(keyspace) = self.keyspaces.get(table) {
            return Ok(keyspace.clone());
        }
        let keyspace = self.database.keyspace(table, KeyspaceCreateOptions::default)?;
        self.keyspaces.insert(table, keyspace.clone());
        Ok(keyspace)
    }

    /// Check if a flush is needed
    fn should_flush(&self) -> bool {
        let count = self.batch_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.flush_every != 0 && count % self.flush_every == 0
    }
}

#[async_trait]
impl EntityStore for FjallEntityStore {
    async fn get(&self, table: &'static str, id: &EntityId) -> Result<Option<Vec<u8>>> {
        let keyspace = self.keyspace(table)?;
        Ok(keyspace.get(id.as_str().as_bytes())?.map(|value| value.to_vec()))
    }

    async fn apply(&self, writes: Vec<EntityWrite>) -> Result<()> {
        let mut batch = self.database.batch();
        for write in writes {
            let keyspace = self.keyspace(write.table)?;
            batch.insert(&keyspace, write.id.as_str().as_bytes(), write.value);
        }
        batch.commit()?;

        if self.should_flush() {
            self.database.persist(PersistMode::Buffer)?;
        }
        Ok(())
    }

    async fn count(&self, table: &'static str) -> Result<usize> {
        Ok(self.keyspace(table)?.iter().count())
    }
}
