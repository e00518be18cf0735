use super::id::decode_pit_id;
use super::types::{PitSearchRequest, PitSearchResponse, ShardFailure};
use crate::cluster::PitTransport;
use crate::config::PitConfig;
use crate::core::{PitError, Result};
use crate::node::ShardSearchRequest;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{Level, event};

/// Runs a query against the frozen shard views behind a PIT id.
pub struct PitSearcher {
    config: PitConfig,
    transport: Arc<dyn PitTransport>,
}

impl PitSearcher {
    pub fn new(config: PitConfig, transport: Arc<dyn PitTransport>) -> Self {
        Self { config, transport }
    }

    /// Searches every shard of the PIT. Hits are concatenated in shard order
    /// and cut at `size`; a search fails only when no shard answered.
    pub async fn search(&self, request: PitSearchRequest) -> Result<PitSearchResponse> {
        let references = decode_pit_id(&request.pit_id)?;
        if let Some(keep_alive) = request.keep_alive {
            self.config.resolve_keep_alive(Some(keep_alive))?;
        }
        let shard_request = ShardSearchRequest {
            size: request.size,
            term: request.term.clone(),
        };
        let node_timeout = self.config.node_request_timeout_duration();
        let total_shards = references.len();

        let calls = references.into_iter().map(|reference| {
            let transport = Arc::clone(&self.transport);
            let shard_request = shard_request.clone();
            let keep_alive = request.keep_alive;
            async move {
                let call = transport.search_shard(
                    &reference.node_id,
                    reference.token.clone(),
                    keep_alive,
                    shard_request,
                );
                let result = match timeout(node_timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(PitError::NodeTimeout {
                        node_id: reference.node_id.clone(),
                        timeout_ms: node_timeout.as_millis() as u64,
                    }),
                };
                (reference, result)
            }
        });

        let mut total_hits = 0usize;
        let mut hits = Vec::new();
        let mut failed_shards = Vec::new();
        for (reference, result) in join_all(calls).await {
            match result {
                Ok(shard_result) => {
                    total_hits += shard_result.total_hits;
                    hits.extend(shard_result.hits);
                }
                Err(err) => failed_shards.push(ShardFailure {
                    shard: reference.shard,
                    node_id: Some(reference.node_id),
                    reason: err.to_string(),
                }),
            }
        }

        if failed_shards.len() == total_shards {
            let reason = failed_shards
                .first()
                .map(|failure| failure.reason.clone())
                .unwrap_or_default();
            event!(Level::DEBUG, shards = total_shards, "PIT search failed on every shard");
            return Err(PitError::SearchPhaseFailed(format!(
                "all shards failed: {}",
                reason
            )));
        }
        hits.truncate(request.size);

        Ok(PitSearchResponse {
            pit_id: request.pit_id,
            total_shards,
            successful_shards: total_shards - failed_shards.len(),
            failed_shards,
            total_hits,
            hits,
        })
    }
}
