//! In-memory entity store using DashMap
// Sharded locks keep readers off a global lock, at the cost of more memory

use super::{EntityStore, EntityWrite};
use crate::types::EntityId;
use anyhow::Result;
use async_trait::async_trait;
use ::dashmap::DashMap;
use tracing::info;

pub struct DashMapEntityStore {
    /// Entities keyed by table and id
    entries: DashMap<(&'static str, EntityId), Vec<u8>>,
}

impl DashMapEntityStore {
    pub fn new() -> Self {
        info!("Storing entities in memory (DashMap)");
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for DashMapEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for DashMapEntityStore {
    async fn get(&self, table: &'static str, id: &EntityId) -> Result<Option<Vec<u8>>> {
        // Clone out, the ref is not async safe
        Ok(self.entries.get(&(table, id.clone())).map(|value| value.clone()))
    }

    async fn apply(&self, writes: Vec<EntityWrite>) -> Result<()> {
        for write in writes {
            self.entries.insert((write.table, write.id), write.value);
        }
        Ok(())
    }

    async fn count(&self, table: &'static str) -> Result<usize> {
        Ok(self.entries.iter().filter(|entry| entry.key().0 == table).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_per_table() {
        let store = DashMapEntityStore::new();
        store
            .apply(vec![
                EntityWrite { table: "spells", id: "1-0x01".into(), value: vec![1] },
                EntityWrite { table: "spells", id: "1-0x02".into(), value: vec![2] },
                EntityWrite { table: "spells-v2", id: "1-0x01".into(), value: vec![3] },
            ])
            .await
            .unwrap();
        assert_eq!(store.count("spells").await.unwrap(), 2);
        assert_eq!(store.count("spells-v2").await.unwrap(), 1);
        assert_eq!(
            store.get("spells-v2", &"1-0x01".into()).await.unwrap(),
            Some(vec![3])
        );
    }
}
