use super::context::ShardSnapshot;
use crate::core::{Document, PitError, Result, ShardId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Default)]
struct ShardData {
    generation: u64,
    documents: Arc<Vec<Document>>,
}

/// Shard copies hosted by one node.
///
/// Writes publish a fresh document vector, so snapshots handed out earlier
/// keep seeing exactly the generation they captured.
#[derive(Debug, Default)]
pub struct ShardStore {
    shards: RwLock<HashMap<ShardId, ShardData>>,
}

impl ShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts hosting an empty copy of `shard`. Hosting twice is a no-op.
    pub fn host(&self, shard: ShardId) -> Result<()> {
        let mut shards = self.shards.write()?;
        shards.entry(shard).or_default();
        Ok(())
    }

    pub fn hosted_shards(&self) -> Result<Vec<ShardId>> {
        let mut shards = self.shards.read()?.keys().cloned().collect::<Vec<_>>();
        shards.sort();
        Ok(shards)
    }

    /// Appends a document and returns the new shard generation.
    pub fn index_document(&self, shard: &ShardId, document: Document) -> Result<u64> {
        let mut shards = self.shards.write()?;
        let data = shards
            .get_mut(shard)
            .ok_or_else(|| PitError::ShardNotFound(shard.to_string()))?;
        let mut documents = Vec::with_capacity(data.documents.len() + 1);
        documents.extend(data.documents.iter().cloned());
        documents.push(document);
        data.documents = Arc::new(documents);
        data.generation = data.generation.saturating_add(1);
        Ok(data.generation)
    }

    /// Stops hosting every shard of `index`. Open snapshots stay readable.
    pub fn drop_index(&self, index: &str) -> Result<usize> {
        let mut shards = self.shards.write()?;
        let before = shards.len();
        shards.retain(|shard, _| shard.index != index);
        Ok(before - shards.len())
    }

    pub fn snapshot(&self, shard: &ShardId) -> Result<ShardSnapshot> {
        let shards = self.shards.read()?;
        let data = shards
            .get(shard)
            .ok_or_else(|| PitError::ShardNotFound(shard.to_string()))?;
        Ok(ShardSnapshot::new(
            shard.clone(),
            data.generation,
            Arc::clone(&data.documents),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_is_stable_across_writes() {
        let store = ShardStore::new();
        let shard = ShardId::new("index", 0);
        store.host(shard.clone()).unwrap();
        store.index_document(&shard, json!({"field": "a"})).unwrap();

        let pinned = store.snapshot(&shard).unwrap();
        store.index_document(&shard, json!({"field": "b"})).unwrap();

        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned.generation, 1);
        assert_eq!(store.snapshot(&shard).unwrap().len(), 2);
    }

    #[test]
    fn drop_index_keeps_open_snapshots() {
        let store = ShardStore::new();
        let shard = ShardId::new("logs", 1);
        store.host(shard.clone()).unwrap();
        store.host(ShardId::new("other", 0)).unwrap();
        store.index_document(&shard, json!({"n": 1})).unwrap();
        let pinned = store.snapshot(&shard).unwrap();

        assert_eq!(store.drop_index("logs").unwrap(), 1);
        assert!(matches!(
            store.snapshot(&shard),
            Err(PitError::ShardNotFound(_))
        ));
        assert_eq!(pinned.len(), 1);
        assert_eq!(store.hosted_shards().unwrap(), vec![ShardId::new("other", 0)]);
    }
}
