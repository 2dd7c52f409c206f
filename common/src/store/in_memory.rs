//! In-memory entity store using a standard HashMap per table

use super::{EntityStore, EntityWrite};
use crate::types::EntityId;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

type Table = HashMap<EntityId, Vec<u8>>;

pub struct InMemoryEntityStore {
    /// Tables by name
    tables: RwLock<HashMap<&'static str, Table>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        info!("Storing entities in memory (standard)");
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get(&self, table: &'static str, id: &EntityId) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.read().await.get(table).and_then(|entries| entries.get(id).cloned()))
    }

    async fn apply(&self, writes: Vec<EntityWrite>) -> Result<()> {
        // Single write lock makes the batch atomic to readers
        let mut tables = self.tables.write().await;
        for write in writes {
            tables.entry(write.table).or_default().insert(write.id, write.value);
        }
        Ok(())
    }

    async fn count(&self, table: &'static str) -> Result<usize> {
        Ok(self.tables.read().await.get(table).map(|entries| entries.len()).unwrap_or(0))
    }
}
