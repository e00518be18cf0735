use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored document. Shard data is opaque JSON to this crate.
pub type Document = serde_json::Value;

/// Addresses one shard of one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    pub index: String,
    pub shard: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, shard: u32) -> Self {
        Self {
            index: index.into(),
            shard,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.shard)
    }
}

/// Node-local handle of a reader context.
///
/// `session_id` is minted once per node service instance, so tokens issued
/// before a node restart never resolve on the restarted node even when the
/// counter starts over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextToken {
    pub session_id: String,
    pub id: u64,
}

impl ContextToken {
    pub fn new(session_id: impl Into<String>, id: u64) -> Self {
        Self {
            session_id: session_id.into(),
            id,
        }
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session_id, self.id)
    }
}

/// One entry of a composite PIT id: where a shard's reader context lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardReference {
    pub node_id: String,
    pub shard: ShardId,
    pub token: ContextToken,
}

impl ShardReference {
    pub fn new(node_id: impl Into<String>, shard: ShardId, token: ContextToken) -> Self {
        Self {
            node_id: node_id.into(),
            shard,
            token,
        }
    }
}
