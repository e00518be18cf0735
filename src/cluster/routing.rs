/// Placement of one index: which nodes hold a copy of each shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexRouting {
    pub shard_count: u32,
    /// Shard number to copy holders, primary first.
    #[serde(default)]
    pub copies: BTreeMap<u32, Vec<String>>,
}

/// Maps every shard of every index to the nodes holding a copy of it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct IndexRoutingTable {
    #[serde(default)]
    pub indices: BTreeMap<String, IndexRouting>,
}

impl IndexRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `index` and spreads its shard copies across `nodes`.
    ///
    /// Shard `n` gets its primary on `nodes[n % len]` and each replica on the
    /// following node, so no node holds two copies of the same shard.
    pub fn add_index(
        &mut self,
        index: impl Into<String>,
        shard_count: u32,
        replicas: usize,
        nodes: &[String],
    ) -> Result<Vec<ShardId>> {
        let index = index.into();
        if index.trim().is_empty() {
            return Err(PitError::ExecutionError("index name must not be empty".to_string()));
        }
        if shard_count == 0 {
            return Err(PitError::ExecutionError("shard_count must be >= 1".to_string()));
        }
        if nodes.is_empty() || replicas + 1 > nodes.len() {
            return Err(PitError::ExecutionError(format!(
                "Index '{}' needs {} nodes for {} replicas, cluster has {}",
                index,
                replicas + 1,
                replicas,
                nodes.len()
            )));
        }

        let mut copies = BTreeMap::new();
        for shard in 0..shard_count {
            let holders = (0..=replicas)
                .map(|offset| nodes[(shard as usize + offset) % nodes.len()].clone())
                .collect::<Vec<_>>();
            copies.insert(shard, holders);
        }
        self.indices.insert(
            index.clone(),
            IndexRouting {
                shard_count,
                copies,
            },
        );
        self.shards_of(&index)
    }

    /// Overrides the copy holders of one shard.
    pub fn set_shard_copies(&mut self, shard: &ShardId, nodes: Vec<String>) -> Result<()> {
        let routing = self
            .indices
            .get_mut(&shard.index)
            .ok_or_else(|| PitError::IndexNotFound(shard.index.clone()))?;
        if shard.shard >= routing.shard_count {
            return Err(PitError::ShardNotFound(format!(
                "{} is out of range for shard_count {}",
                shard, routing.shard_count
            )));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for node in nodes {
            let node = node.trim().to_string();
            if node.is_empty() {
                return Err(PitError::ExecutionError(
                    "copy holder node id must not be empty".to_string(),
                ));
            }
            if seen.insert(node.clone()) {
                normalized.push(node);
            }
        }
        routing.copies.insert(shard.shard, normalized);
        Ok(())
    }

    pub fn remove_index(&mut self, index: &str) -> bool {
        self.indices.remove(index).is_some()
    }

    pub fn indices(&self) -> Vec<String> {
        self.indices.keys().cloned().collect()
    }

    pub fn shards_of(&self, index: &str) -> Result<Vec<ShardId>> {
        let routing = self
            .indices
            .get(index)
            .ok_or_else(|| PitError::IndexNotFound(index.to_string()))?;
        Ok((0..routing.shard_count)
            .map(|shard| ShardId::new(index, shard))
            .collect())
    }

    /// Copy holders for the shard, primary first. Empty when unassigned.
    pub fn copies_for(&self, shard: &ShardId) -> Vec<String> {
        self.indices
            .get(&shard.index)
            .and_then(|routing| routing.copies.get(&shard.shard))
            .cloned()
            .unwrap_or_default()
    }

    /// Validates the integrity of the routing table.
    pub fn validate(&self) -> Result<()> {
        for (index, routing) in &self.indices {
            if routing.shard_count == 0 {
                return Err(PitError::ExecutionError(format!(
                    "Index '{}' must have shard_count >= 1",
                    index
                )));
            }
            for (shard, holders) in &routing.copies {
                if *shard >= routing.shard_count {
                    return Err(PitError::ExecutionError(format!(
                        "Shard {} of index '{}' is out of range for shard_count {}",
                        shard, index, routing.shard_count
                    )));
                }
                let mut dedupe = HashSet::new();
                for holder in holders {
                    if holder.trim().is_empty() {
                        return Err(PitError::ExecutionError(format!(
                            "Copy holder for shard {} of index '{}' must not be empty",
                            shard, index
                        )));
                    }
                    if !dedupe.insert(holder) {
                        return Err(PitError::ExecutionError(format!(
                            "Node '{}' holds shard {} of index '{}' more than once",
                            holder, shard, index
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
