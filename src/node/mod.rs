//! Node-local side of point-in-time contexts: shard copies, the reader
//! context table and the service object that owns both.

pub mod context;
pub mod reaper;
pub mod service;
pub mod shards;
pub mod store;

pub use context::{ListedContext, ReaderContext, ReaderContextLease, ShardSnapshot};
pub use reaper::{ContextReaper, spawn_context_reaper};
pub use service::{PitNodeService, ShardSearchRequest, ShardSearchResult, TermFilter};
pub use shards::ShardStore;
pub use store::{FreeOutcome, ReaderContextStore};
