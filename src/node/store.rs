use super::context::{ReaderContext, ReaderContextLease};
use crate::core::{PitError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Result of removing one context from a node-local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FreeOutcome {
    Removed,
    NotFound,
}

impl FreeOutcome {
    pub fn was_removed(self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Node-local table of open reader contexts keyed by context id.
///
/// Every operation holds the lock for a single map access; searches work on
/// the `Arc` they captured, never on the map entry.
#[derive(Debug)]
pub struct ReaderContextStore {
    contexts: RwLock<HashMap<u64, Arc<ReaderContext>>>,
    origin: Instant,
}

impl Default for ReaderContextStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderContextStore {
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            origin: Instant::now(),
        }
    }

    /// Milliseconds elapsed on this store's clock.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Registers a context, refusing when `limit` live contexts already exist.
    pub fn put(&self, context: ReaderContext, limit: usize, node_id: &str) -> Result<()> {
        let mut contexts = self.contexts.write()?;
        if contexts.len() >= limit {
            let now_ms = self.now_ms();
            contexts.retain(|_, existing| !existing.is_reapable(now_ms));
            if contexts.len() >= limit {
                return Err(PitError::TooManyContexts {
                    node_id: node_id.to_string(),
                    limit,
                });
            }
        }
        contexts.insert(context.token().id, Arc::new(context));
        Ok(())
    }

    /// Leases a live context. Expired contexts are reported absent and dropped
    /// once no search holds them.
    pub fn acquire(&self, id: u64) -> Result<Option<ReaderContextLease>> {
        let now_ms = self.now_ms();
        {
            let contexts = self.contexts.read()?;
            match contexts.get(&id) {
                None => return Ok(None),
                Some(context) if !context.is_expired(now_ms) => {
                    return Ok(Some(ReaderContextLease::acquire(Arc::clone(context))));
                }
                Some(_) => {}
            }
        }
        let mut contexts = self.contexts.write()?;
        if contexts
            .get(&id)
            .is_some_and(|context| context.is_reapable(now_ms))
        {
            contexts.remove(&id);
        }
        Ok(None)
    }

    /// Removes a context. Under concurrent calls for the same id exactly one
    /// caller observes `Removed`.
    pub fn remove(&self, id: u64) -> Result<FreeOutcome> {
        let now_ms = self.now_ms();
        let mut contexts = self.contexts.write()?;
        match contexts.remove(&id) {
            Some(context) if !context.is_expired(now_ms) => Ok(FreeOutcome::Removed),
            _ => Ok(FreeOutcome::NotFound),
        }
    }

    /// Point-in-time snapshot of live contexts.
    pub fn list_all(&self) -> Result<Vec<Arc<ReaderContext>>> {
        let now_ms = self.now_ms();
        let contexts = self.contexts.read()?;
        let mut live = contexts
            .values()
            .filter(|context| !context.is_expired(now_ms))
            .cloned()
            .collect::<Vec<_>>();
        live.sort_by_key(|context| context.token().id);
        Ok(live)
    }

    pub fn expire_sweep(&self) -> Result<usize> {
        self.expire_sweep_at(self.now_ms())
    }

    pub(crate) fn expire_sweep_at(&self, now_ms: u64) -> Result<usize> {
        let mut contexts = self.contexts.write()?;
        let before = contexts.len();
        contexts.retain(|_, context| !context.is_reapable(now_ms));
        Ok(before - contexts.len())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.contexts.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
