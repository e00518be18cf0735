use crate::cluster::PitTransport;
use crate::core::{ContextToken, PitError, ShardReference};
use crate::node::FreeOutcome;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{Level, event};

/// What happened to one shard reference during deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardDeleteOutcome {
    Removed,
    NotFound,
    /// The owning node could not be contacted within the bounded wait.
    Unreachable,
}

impl From<FreeOutcome> for ShardDeleteOutcome {
    fn from(outcome: FreeOutcome) -> Self {
        match outcome {
            FreeOutcome::Removed => Self::Removed,
            FreeOutcome::NotFound => Self::NotFound,
        }
    }
}

/// Sends free requests to the node owning each reference.
///
/// Never fails: transport errors and timeouts are classified as
/// `Unreachable` so the coordinator can decide per PIT id.
#[derive(Clone)]
pub struct ShardDeleteExecutor {
    transport: Arc<dyn PitTransport>,
    node_timeout: Duration,
}

impl ShardDeleteExecutor {
    pub fn new(transport: Arc<dyn PitTransport>, node_timeout: Duration) -> Self {
        Self {
            transport,
            node_timeout,
        }
    }

    pub async fn delete_one(&self, reference: &ShardReference) -> ShardDeleteOutcome {
        self.delete_on_node(&reference.node_id, vec![reference.token.clone()])
            .await
            .pop()
            .unwrap_or(ShardDeleteOutcome::Unreachable)
    }

    /// Frees `tokens` on `node_id` with one request, returning one outcome per token.
    pub async fn delete_on_node(
        &self,
        node_id: &str,
        tokens: Vec<ContextToken>,
    ) -> Vec<ShardDeleteOutcome> {
        let expected = tokens.len();
        let call = self.transport.free_contexts(node_id, tokens);
        let result = match timeout(self.node_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PitError::NodeTimeout {
                node_id: node_id.to_string(),
                timeout_ms: self.node_timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(outcomes) if outcomes.len() == expected => {
                outcomes.into_iter().map(ShardDeleteOutcome::from).collect()
            }
            Ok(outcomes) => {
                warn!(
                    "node '{}' answered {} outcomes for {} contexts",
                    node_id,
                    outcomes.len(),
                    expected
                );
                vec![ShardDeleteOutcome::Unreachable; expected]
            }
            Err(err) => {
                if err.is_unreachable() {
                    event!(
                        Level::DEBUG,
                        node_id = %node_id,
                        error = %err,
                        "free contexts unreachable"
                    );
                } else {
                    warn!("free contexts on node '{}' failed: {}", node_id, err);
                }
                vec![ShardDeleteOutcome::Unreachable; expected]
            }
        }
    }
}
