use super::context::{ListedContext, ReaderContext};
use super::shards::ShardStore;
use super::store::{FreeOutcome, ReaderContextStore};
use crate::config::PitConfig;
use crate::core::{ContextToken, Document, PitError, Result, ShardId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{Level, event, info_span};

/// Exact-match filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermFilter {
    pub field: String,
    pub value: serde_json::Value,
}

impl TermFilter {
    pub fn new(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn matches(&self, document: &Document) -> bool {
        document.get(self.field.as_str()) == Some(&self.value)
    }
}

/// Shard-level search executed against one reader context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSearchRequest {
    pub size: usize,
    #[serde(default)]
    pub term: Option<TermFilter>,
}

impl Default for ShardSearchRequest {
    fn default() -> Self {
        Self {
            size: 10,
            term: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardSearchResult {
    pub shard: ShardId,
    pub generation: u64,
    pub total_hits: usize,
    pub hits: Vec<Document>,
}

/// Node-scoped owner of shard copies and the reader contexts opened on them.
///
/// Constructed once per node process; dropping it drops every context it
/// holds. A restarted node gets a new service and therefore a new session.
#[derive(Debug)]
pub struct PitNodeService {
    node_id: String,
    session_id: String,
    config: PitConfig,
    shards: ShardStore,
    contexts: ReaderContextStore,
    next_context_id: AtomicU64,
}

impl PitNodeService {
    pub fn new(node_id: impl Into<String>, config: PitConfig) -> Result<Self> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(PitError::ExecutionError("node_id must not be empty".to_string()));
        }
        config.validate()?;
        Ok(Self {
            node_id,
            session_id: uuid::Uuid::new_v4().simple().to_string(),
            config,
            shards: ShardStore::new(),
            contexts: ReaderContextStore::new(),
            next_context_id: AtomicU64::new(1),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &PitConfig {
        &self.config
    }

    pub fn shards(&self) -> &ShardStore {
        &self.shards
    }

    pub fn open_context_count(&self) -> Result<usize> {
        self.contexts.len()
    }

    /// Opens a reader context pinning the current view of `shard`.
    pub fn open_reader_context(
        &self,
        shard: &ShardId,
        keep_alive: Duration,
    ) -> Result<ContextToken> {
        let keep_alive = self.config.resolve_keep_alive(Some(keep_alive))?;
        let snapshot = self.shards.snapshot(shard)?;
        let token = ContextToken::new(
            self.session_id.clone(),
            self.next_context_id.fetch_add(1, Ordering::AcqRel),
        );
        let now_ms = self.contexts.now_ms();
        let context = ReaderContext::new(token.clone(), snapshot, keep_alive, now_ms);
        self.contexts
            .put(context, self.config.max_open_contexts_per_node, &self.node_id)?;
        event!(
            Level::DEBUG,
            node_id = %self.node_id,
            shard = %shard,
            token = %token,
            "reader context opened"
        );
        Ok(token)
    }

    /// Frees one context. Tokens minted by another session are simply absent.
    pub fn free_context(&self, token: &ContextToken) -> Result<FreeOutcome> {
        if token.session_id != self.session_id {
            return Ok(FreeOutcome::NotFound);
        }
        self.contexts.remove(token.id)
    }

    pub fn free_contexts(&self, tokens: &[ContextToken]) -> Result<Vec<FreeOutcome>> {
        let span = info_span!("pit.node.free", node_id = %self.node_id, count = tokens.len());
        let _enter = span.enter();

        let outcomes = tokens
            .iter()
            .map(|token| self.free_context(token))
            .collect::<Result<Vec<_>>>()?;
        event!(
            Level::DEBUG,
            removed = outcomes.iter().filter(|outcome| outcome.was_removed()).count(),
            "reader contexts freed"
        );
        Ok(outcomes)
    }

    /// Records the composite PIT id on each context it references here.
    ///
    /// Returns how many contexts accepted the id; absent tokens are skipped.
    pub fn attach_pit_id(&self, tokens: &[ContextToken], pit_id: &str) -> Result<usize> {
        let mut attached = 0usize;
        for token in tokens {
            if token.session_id != self.session_id {
                continue;
            }
            if let Some(lease) = self.contexts.acquire(token.id)? {
                if lease.context().attach_pit_id(pit_id) {
                    attached += 1;
                }
            }
        }
        Ok(attached)
    }

    pub fn list_contexts(&self) -> Result<Vec<ListedContext>> {
        Ok(self
            .contexts
            .list_all()?
            .iter()
            .map(|context| context.listed())
            .collect())
    }

    /// Runs a search against a live context, renewing its keep-alive.
    ///
    /// Fails with `ContextNotFound` once the context was freed or expired.
    pub fn search_shard(
        &self,
        token: &ContextToken,
        keep_alive: Option<Duration>,
        request: &ShardSearchRequest,
    ) -> Result<ShardSearchResult> {
        let not_found = || PitError::ContextNotFound {
            node_id: self.node_id.clone(),
            token: token.to_string(),
        };
        if token.session_id != self.session_id {
            return Err(not_found());
        }
        let keep_alive = keep_alive
            .map(|requested| self.config.resolve_keep_alive(Some(requested)))
            .transpose()?;

        let lease = self.contexts.acquire(token.id)?.ok_or_else(not_found)?;
        let context = lease.context();
        let renewed = keep_alive
            .is_none_or(|keep_alive| context.renew(keep_alive, self.contexts.now_ms()));
        if !renewed {
            return Err(not_found());
        }

        let snapshot = context.snapshot();
        let mut total_hits = 0usize;
        let mut hits = Vec::new();
        for document in snapshot.documents() {
            let matched = request
                .term
                .as_ref()
                .is_none_or(|term| term.matches(document));
            if matched {
                total_hits += 1;
                if hits.len() < request.size {
                    hits.push(document.clone());
                }
            }
        }

        Ok(ShardSearchResult {
            shard: snapshot.shard.clone(),
            generation: snapshot.generation,
            total_hits,
            hits,
        })
    }

    /// Removes expired contexts; returns how many were dropped.
    pub fn expire_sweep(&self) -> Result<usize> {
        let expired = self.contexts.expire_sweep()?;
        if expired > 0 {
            event!(Level::DEBUG, node_id = %self.node_id, expired, "reader contexts expired");
        }
        Ok(expired)
    }
}
