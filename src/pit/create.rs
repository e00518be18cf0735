use super::id::encode_pit_id;
use super::types::{CreatePitRequest, CreatePitResponse, ShardFailure};
use crate::cluster::{ClusterView, IndexRoutingTable, PitTransport};
use crate::config::PitConfig;
use crate::core::{ContextToken, PitError, Result, ShardId, ShardReference};
use chrono::Utc;
use futures::future::join_all;
use log::warn;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Level, event};

/// Opens one reader context per shard of the requested indices and hands
/// back the composite id.
pub struct PitCreator {
    config: PitConfig,
    routing: Arc<RwLock<IndexRoutingTable>>,
    transport: Arc<dyn PitTransport>,
    view: Arc<dyn ClusterView>,
}

impl PitCreator {
    pub fn new(
        config: PitConfig,
        routing: Arc<RwLock<IndexRoutingTable>>,
        transport: Arc<dyn PitTransport>,
        view: Arc<dyn ClusterView>,
    ) -> Self {
        Self {
            config,
            routing,
            transport,
            view,
        }
    }

    pub async fn create(&self, request: CreatePitRequest) -> Result<CreatePitResponse> {
        if request.indices.is_empty() {
            return Err(PitError::ExecutionError("no indices specified".to_string()));
        }
        let keep_alive = self.config.resolve_keep_alive(Some(request.keep_alive))?;
        let plan = self.plan(&request.indices)?;
        let total_shards = plan.len();

        let tasks = plan
            .into_iter()
            .map(|(shard, copies)| {
                let transport = Arc::clone(&self.transport);
                let node_timeout = self.config.node_request_timeout_duration();
                tokio::spawn(open_on_first_copy(
                    transport,
                    shard,
                    copies,
                    keep_alive,
                    node_timeout,
                ))
            })
            .collect::<Vec<_>>();

        let mut references = Vec::new();
        let mut failed_shards = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(Ok(reference)) => references.push(reference),
                Ok(Err(failure)) => failed_shards.push(failure),
                Err(err) => {
                    let reason = format!("PIT create task failed: {}", err);
                    return Err(PitError::ExecutionError(reason));
                }
            }
        }

        if references.is_empty() || (!failed_shards.is_empty() && !request.allow_partial) {
            self.release(&references).await;
            let reasons = failed_shards
                .iter()
                .map(|failure| format!("{}: {}", failure.shard, failure.reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PitError::SearchPhaseFailed(format!(
                "{} of {} shards failed while creating PIT: {}",
                failed_shards.len(),
                total_shards,
                reasons
            )));
        }

        let id = encode_pit_id(&references)?;
        self.attach(&references, &id).await;
        event!(
            Level::DEBUG,
            shards = references.len(),
            failed = failed_shards.len(),
            "PIT created"
        );

        Ok(CreatePitResponse {
            id,
            total_shards,
            successful_shards: references.len(),
            failed_shards,
            creation_time: Utc::now(),
        })
    }

    /// Resolves every requested shard to its member copies in routing order.
    fn plan(&self, indices: &[String]) -> Result<Vec<(ShardId, Vec<String>)>> {
        let routing = self.routing.read()?;
        let mut plan = Vec::new();
        for index in indices {
            for shard in routing.shards_of(index)? {
                let copies = routing
                    .copies_for(&shard)
                    .into_iter()
                    .filter(|node_id| self.view.is_member(node_id))
                    .collect();
                plan.push((shard, copies));
            }
        }
        Ok(plan)
    }

    async fn attach(&self, references: &[ShardReference], pit_id: &str) {
        for (node_id, tokens) in tokens_by_node(references) {
            if let Err(err) = self
                .transport
                .attach_pit_id(&node_id, tokens, pit_id.to_string())
                .await
            {
                warn!("could not record PIT id on node '{}': {}", node_id, err);
            }
        }
    }

    async fn release(&self, references: &[ShardReference]) {
        for (node_id, tokens) in tokens_by_node(references) {
            if let Err(err) = self.transport.free_contexts(&node_id, tokens).await {
                warn!(
                    "could not release contexts of failed PIT on node '{}': {}",
                    node_id, err
                );
            }
        }
    }
}

fn tokens_by_node(references: &[ShardReference]) -> BTreeMap<String, Vec<ContextToken>> {
    let mut by_node: BTreeMap<String, Vec<ContextToken>> = BTreeMap::new();
    for reference in references {
        by_node
            .entry(reference.node_id.clone())
            .or_default()
            .push(reference.token.clone());
    }
    by_node
}

async fn open_on_first_copy(
    transport: Arc<dyn PitTransport>,
    shard: ShardId,
    copies: Vec<String>,
    keep_alive: Duration,
    node_timeout: Duration,
) -> std::result::Result<ShardReference, ShardFailure> {
    let mut last_failure = ShardFailure {
        shard: shard.clone(),
        node_id: None,
        reason: "no copy of the shard is assigned to a member node".to_string(),
    };
    for node_id in copies {
        let call = transport.open_context(&node_id, &shard, keep_alive);
        let opened = match timeout(node_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PitError::NodeTimeout {
                node_id: node_id.clone(),
                timeout_ms: node_timeout.as_millis() as u64,
            }),
        };
        match opened {
            Ok(token) => return Ok(ShardReference::new(node_id, shard, token)),
            Err(err) => {
                event!(
                    Level::DEBUG,
                    shard = %shard,
                    node_id = %node_id,
                    error = %err,
                    "shard copy could not open context"
                );
                last_failure = ShardFailure {
                    shard: shard.clone(),
                    node_id: Some(node_id),
                    reason: err.to_string(),
                };
            }
        }
    }
    Err(last_failure)
}
