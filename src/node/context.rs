use crate::core::{ContextToken, Document, ShardId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Immutable view of one shard's documents at the moment a reader was opened.
#[derive(Debug, Clone)]
pub struct ShardSnapshot {
    pub shard: ShardId,
    pub generation: u64,
    documents: Arc<Vec<Document>>,
}

impl ShardSnapshot {
    pub fn new(shard: ShardId, generation: u64, documents: Arc<Vec<Document>>) -> Self {
        Self {
            shard,
            generation,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }
}

/// A node-local reader context pinned by a point-in-time.
///
/// Deadlines are stored as milliseconds on the owning store's clock so they
/// can be renewed through a shared `Arc` without taking the store lock.
#[derive(Debug)]
pub struct ReaderContext {
    token: ContextToken,
    snapshot: ShardSnapshot,
    created_at: DateTime<Utc>,
    pit_id: OnceLock<String>,
    keep_alive_ms: AtomicU64,
    expires_at_ms: AtomicU64,
    active_leases: AtomicUsize,
}

impl ReaderContext {
    pub(crate) fn new(
        token: ContextToken,
        snapshot: ShardSnapshot,
        keep_alive: Duration,
        now_ms: u64,
    ) -> Self {
        let keep_alive_ms = keep_alive.as_millis() as u64;
        Self {
            token,
            snapshot,
            created_at: Utc::now(),
            pit_id: OnceLock::new(),
            keep_alive_ms: AtomicU64::new(keep_alive_ms),
            expires_at_ms: AtomicU64::new(now_ms.saturating_add(keep_alive_ms)),
            active_leases: AtomicUsize::new(0),
        }
    }

    pub fn token(&self) -> &ContextToken {
        &self.token
    }

    pub fn shard(&self) -> &ShardId {
        &self.snapshot.shard
    }

    pub fn snapshot(&self) -> &ShardSnapshot {
        &self.snapshot
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Composite id of the PIT this context belongs to, once the create path
    /// has attached it.
    pub fn pit_id(&self) -> Option<&str> {
        self.pit_id.get().map(String::as_str)
    }

    /// Attaches the composite PIT id. Only the first attachment sticks.
    pub(crate) fn attach_pit_id(&self, pit_id: &str) -> bool {
        self.pit_id.set(pit_id.to_string()).is_ok()
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms.load(Ordering::Acquire))
    }

    pub(crate) fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms.load(Ordering::Acquire)
    }

    /// Past the deadline. An expired context is gone for lookups and frees
    /// even while a search that leased it earlier is still running.
    pub(crate) fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    /// Expired and no longer leased, so the entry can be dropped from the store.
    pub(crate) fn is_reapable(&self, now_ms: u64) -> bool {
        self.is_expired(now_ms) && self.active_leases.load(Ordering::Acquire) == 0
    }

    /// Extends the deadline to `now_ms + keep_alive`. Never shortens it and
    /// never revives an expired context; returns false in that case.
    pub(crate) fn renew(&self, keep_alive: Duration, now_ms: u64) -> bool {
        let keep_alive_ms = keep_alive.as_millis() as u64;
        let renewed = self
            .expires_at_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |deadline| {
                (now_ms < deadline).then(|| deadline.max(now_ms.saturating_add(keep_alive_ms)))
            })
            .is_ok();
        if renewed {
            self.keep_alive_ms.store(keep_alive_ms, Ordering::Release);
        }
        renewed
    }

    pub fn active_leases(&self) -> usize {
        self.active_leases.load(Ordering::Acquire)
    }

    pub(crate) fn listed(&self) -> ListedContext {
        ListedContext {
            token: self.token.clone(),
            shard: self.snapshot.shard.clone(),
            pit_id: self.pit_id.get().cloned(),
            created_at: self.created_at,
            keep_alive_ms: self.keep_alive_ms.load(Ordering::Acquire),
        }
    }
}

/// Keeps a reader context usable for the duration of one search.
///
/// The lease holds its own `Arc`, so removing the context from the store
/// never invalidates a search that already acquired it.
#[derive(Debug)]
pub struct ReaderContextLease {
    context: Arc<ReaderContext>,
}

impl ReaderContextLease {
    pub(crate) fn acquire(context: Arc<ReaderContext>) -> Self {
        context.active_leases.fetch_add(1, Ordering::AcqRel);
        Self { context }
    }

    pub fn context(&self) -> &ReaderContext {
        &self.context
    }
}

impl Drop for ReaderContextLease {
    fn drop(&mut self) {
        self.context.active_leases.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Summary of a live context as reported by `list_contexts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedContext {
    pub token: ContextToken,
    pub shard: ShardId,
    #[serde(default)]
    pub pit_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub keep_alive_ms: u64,
}
