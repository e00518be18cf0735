//! Cluster-facing deletion of point-in-time contexts.
//!
//! A delete decodes every requested id up front, groups the referenced
//! contexts by owning node, sends one free request per node in parallel and
//! folds the per-shard outcomes back into one result per requested id.
//!
//! Outcomes fold as follows:
//! - `Removed` and `NotFound` both count as deleted, which makes repeated and
//!   concurrent deletes of the same id converge on success.
//! - `Unreachable` on a node that is still a cluster member fails the id: the
//!   node may come back with the context intact.
//! - `Unreachable` on a node that left the cluster view counts as deleted:
//!   its contexts went away with it.

use super::executor::{ShardDeleteExecutor, ShardDeleteOutcome};
use super::id::{decode_pit_id, encode_pit_id};
use super::types::{DeletePitInfo, DeletePitRequest, DeletePitResponse, ListPitResponse, PitInfo};
use crate::cluster::{ClusterView, PitTransport};
use crate::config::PitConfig;
use crate::core::{ContextToken, PitError, Result, ShardReference};
use crate::node::ListedContext;
use futures::future::join_all;
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Instrument, Level, event, info_span};

/// One PIT id and the shard references it resolves to.
#[derive(Debug, Clone)]
struct DeleteTarget {
    pit_id: String,
    references: Vec<ShardReference>,
}

pub struct PitDeleteCoordinator {
    transport: Arc<dyn PitTransport>,
    view: Arc<dyn ClusterView>,
    executor: ShardDeleteExecutor,
    node_timeout: Duration,
}

impl PitDeleteCoordinator {
    pub fn new(
        transport: Arc<dyn PitTransport>,
        view: Arc<dyn ClusterView>,
        config: &PitConfig,
    ) -> Self {
        let node_timeout = config.node_request_timeout_duration();
        Self {
            executor: ShardDeleteExecutor::new(Arc::clone(&transport), node_timeout),
            transport,
            view,
            node_timeout,
        }
    }

    pub async fn execute(&self, request: DeletePitRequest) -> Result<DeletePitResponse> {
        match request {
            DeletePitRequest::Ids(ids) => self.delete(&ids).await,
            DeletePitRequest::All => self.delete_all().await,
        }
    }

    /// Deletes the given PIT ids, one result per input id in input order.
    ///
    /// A single undecodable id fails the whole call before anything is freed.
    pub async fn delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<DeletePitResponse> {
        if ids.is_empty() {
            return Err(PitError::ExecutionError("no PIT ids specified".to_string()));
        }
        let targets = ids
            .iter()
            .map(|id| {
                let pit_id = id.as_ref().to_string();
                decode_pit_id(&pit_id).map(|references| DeleteTarget { pit_id, references })
            })
            .collect::<Result<Vec<_>>>()
            .inspect_err(|err| event!(Level::DEBUG, error = %err, "PIT delete rejected"))?;

        let results = self
            .fan_out(targets)
            .instrument(info_span!("pit.delete", ids = ids.len()))
            .await;
        event!(
            Level::DEBUG,
            failed = results.iter().filter(|info| !info.successful).count(),
            "PIT delete finished"
        );
        Ok(DeletePitResponse {
            results,
            unreachable_nodes: Vec::new(),
        })
    }

    /// Deletes every PIT context found on the member nodes.
    ///
    /// Contexts that carry their composite id are reported once per PIT;
    /// others are reported per context under a single-shard id. Member nodes
    /// that cannot be enumerated are listed in `unreachable_nodes`.
    pub async fn delete_all(&self) -> Result<DeletePitResponse> {
        let span = info_span!("pit.delete_all");
        let (listed, unreachable_nodes) = self.collect_listings().instrument(span.clone()).await;

        let mut composite: BTreeMap<String, Vec<ShardReference>> = BTreeMap::new();
        let mut targets = Vec::new();
        for (node_id, context) in listed {
            let reference = ShardReference::new(node_id, context.shard, context.token);
            match context.pit_id {
                Some(pit_id) => composite.entry(pit_id).or_default().push(reference),
                None => targets.push(DeleteTarget {
                    pit_id: encode_pit_id(std::slice::from_ref(&reference))?,
                    references: vec![reference],
                }),
            }
        }

        let mut grouped = composite
            .into_iter()
            .map(|(pit_id, listed_references)| {
                let mut references = decode_pit_id(&pit_id).unwrap_or_default();
                for reference in listed_references {
                    if !references.contains(&reference) {
                        references.push(reference);
                    }
                }
                DeleteTarget { pit_id, references }
            })
            .collect::<Vec<_>>();
        grouped.append(&mut targets);

        let results = self.fan_out(grouped).instrument(span).await;
        event!(
            Level::DEBUG,
            pits = results.len(),
            unreachable = unreachable_nodes.len(),
            "PIT delete-all finished"
        );
        Ok(DeletePitResponse {
            results,
            unreachable_nodes,
        })
    }

    /// Lists every live PIT context on the member nodes.
    pub async fn list_all(&self) -> Result<ListPitResponse> {
        let (listed, unreachable_nodes) = self.collect_listings().await;
        let pits = listed
            .into_iter()
            .map(|(node_id, context)| {
                let pit_id = match context.pit_id {
                    Some(pit_id) => pit_id,
                    None => encode_pit_id(&[ShardReference::new(
                        node_id.clone(),
                        context.shard.clone(),
                        context.token.clone(),
                    )])?,
                };
                Ok(PitInfo {
                    pit_id,
                    node_id,
                    shard: context.shard,
                    creation_time: context.created_at,
                    keep_alive_ms: context.keep_alive_ms,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ListPitResponse {
            pits,
            unreachable_nodes,
        })
    }

    /// Asks every member node for its contexts in parallel.
    async fn collect_listings(&self) -> (Vec<(String, ListedContext)>, Vec<String>) {
        let tasks = self
            .view
            .member_nodes()
            .into_iter()
            .map(|node_id| {
                let transport = Arc::clone(&self.transport);
                let node_timeout = self.node_timeout;
                tokio::spawn(async move {
                    let result =
                        match timeout(node_timeout, transport.list_contexts(&node_id)).await {
                            Ok(result) => result,
                            Err(_) => Err(PitError::NodeTimeout {
                                node_id: node_id.clone(),
                                timeout_ms: node_timeout.as_millis() as u64,
                            }),
                        };
                    (node_id, result)
                })
            })
            .collect::<Vec<_>>();

        let mut listed = Vec::new();
        let mut unreachable_nodes = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok((node_id, Ok(contexts))) => {
                    listed.extend(contexts.into_iter().map(|context| (node_id.clone(), context)));
                }
                Ok((node_id, Err(err))) => {
                    warn!("could not list PIT contexts on node '{}': {}", node_id, err);
                    unreachable_nodes.push(node_id);
                }
                Err(err) => warn!("PIT listing task failed: {}", err),
            }
        }
        (listed, unreachable_nodes)
    }

    /// Frees every reference of every target, one request per node, and
    /// folds the outcomes per target.
    async fn fan_out(&self, targets: Vec<DeleteTarget>) -> Vec<DeletePitInfo> {
        let mut by_node: BTreeMap<String, Vec<(usize, usize, ContextToken)>> = BTreeMap::new();
        for (target_idx, target) in targets.iter().enumerate() {
            for (reference_idx, reference) in target.references.iter().enumerate() {
                by_node.entry(reference.node_id.clone()).or_default().push((
                    target_idx,
                    reference_idx,
                    reference.token.clone(),
                ));
            }
        }

        let tasks = by_node
            .into_iter()
            .map(|(node_id, entries)| {
                let executor = self.executor.clone();
                tokio::spawn(async move {
                    let tokens = entries
                        .iter()
                        .map(|(_, _, token)| token.clone())
                        .collect::<Vec<_>>();
                    let outcomes = executor.delete_on_node(&node_id, tokens).await;
                    entries
                        .into_iter()
                        .map(|(target_idx, reference_idx, _)| (target_idx, reference_idx))
                        .zip(outcomes)
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        let mut outcomes = targets
            .iter()
            .map(|target| vec![ShardDeleteOutcome::Unreachable; target.references.len()])
            .collect::<Vec<_>>();
        for joined in join_all(tasks).await {
            match joined {
                Ok(pairs) => {
                    for ((target_idx, reference_idx), outcome) in pairs {
                        outcomes[target_idx][reference_idx] = outcome;
                    }
                }
                Err(err) => warn!("PIT free task failed: {}", err),
            }
        }

        targets
            .into_iter()
            .zip(outcomes)
            .map(|(target, outcomes)| DeletePitInfo {
                successful: self.is_deleted(&target.references, &outcomes),
                pit_id: target.pit_id,
            })
            .collect()
    }

    fn is_deleted(&self, references: &[ShardReference], outcomes: &[ShardDeleteOutcome]) -> bool {
        references
            .iter()
            .zip(outcomes)
            .all(|(reference, outcome)| match outcome {
                ShardDeleteOutcome::Removed | ShardDeleteOutcome::NotFound => true,
                ShardDeleteOutcome::Unreachable => !self.view.is_member(&reference.node_id),
            })
    }
}
