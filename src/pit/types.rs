use crate::core::{Document, ShardId};
use crate::node::TermFilter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sentinel accepted in place of an id list to delete every live PIT.
pub const ALL_PITS: &str = "_all";

/// Either an explicit id list or the delete-all sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletePitRequest {
    Ids(Vec<String>),
    All,
}

impl DeletePitRequest {
    /// Builds a request from raw ids; a lone `_all` selects every PIT.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect::<Vec<String>>();
        if ids.len() == 1 && ids[0] == ALL_PITS {
            Self::All
        } else {
            Self::Ids(ids)
        }
    }
}

/// Outcome for one PIT id. Never partial: the id is either fully gone or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePitInfo {
    pub pit_id: String,
    pub successful: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePitResponse {
    pub results: Vec<DeletePitInfo>,
    /// Member nodes that could not be enumerated during delete-all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreachable_nodes: Vec<String>,
}

impl DeletePitResponse {
    pub fn all_successful(&self) -> bool {
        self.results.iter().all(|info| info.successful)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePitRequest {
    pub keep_alive: Duration,
    pub indices: Vec<String>,
    /// Accept a PIT that covers only the shards that could be opened.
    pub allow_partial: bool,
}

impl CreatePitRequest {
    pub fn new(keep_alive: Duration, allow_partial: bool) -> Self {
        Self {
            keep_alive,
            indices: Vec::new(),
            allow_partial,
        }
    }

    pub fn indices<I, S>(mut self, indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indices = indices.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard: ShardId,
    #[serde(default)]
    pub node_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePitResponse {
    pub id: String,
    pub total_shards: usize,
    pub successful_shards: usize,
    pub failed_shards: Vec<ShardFailure>,
    pub creation_time: DateTime<Utc>,
}

impl CreatePitResponse {
    pub fn shard_count(&self) -> usize {
        self.successful_shards
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitSearchRequest {
    pub pit_id: String,
    #[serde(default)]
    pub keep_alive: Option<Duration>,
    pub size: usize,
    #[serde(default)]
    pub term: Option<TermFilter>,
}

impl PitSearchRequest {
    pub fn new(pit_id: impl Into<String>) -> Self {
        Self {
            pit_id: pit_id.into(),
            keep_alive: None,
            size: 10,
            term: None,
        }
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn term(mut self, term: TermFilter) -> Self {
        self.term = Some(term);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitSearchResponse {
    pub pit_id: String,
    pub total_shards: usize,
    pub successful_shards: usize,
    pub failed_shards: Vec<ShardFailure>,
    pub total_hits: usize,
    pub hits: Vec<Document>,
}

/// One live PIT as reported by `list_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitInfo {
    pub pit_id: String,
    pub node_id: String,
    pub shard: ShardId,
    pub creation_time: DateTime<Utc>,
    pub keep_alive_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPitResponse {
    pub pits: Vec<PitInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreachable_nodes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lone_all_sentinel_selects_everything() {
        assert_eq!(DeletePitRequest::from_ids(["_all"]), DeletePitRequest::All);
        assert_eq!(
            DeletePitRequest::from_ids(["_all", "other"]),
            DeletePitRequest::Ids(vec!["_all".to_string(), "other".to_string()])
        );
    }

    #[test]
    fn empty_response_is_successful() {
        assert!(DeletePitResponse::default().all_successful());
    }
}
