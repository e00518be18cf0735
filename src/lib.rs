// ============================================================================
// pitkeeper Library
// ============================================================================

pub mod cluster;
pub mod config;
pub mod core;
pub mod node;
pub mod pit;

// Re-export main types for convenience
pub use cluster::{
    ClusterMembership, ClusterView, InMemoryClusterView, InMemoryPitTransport, IndexRoutingTable,
    PitTransport,
};
pub use config::PitConfig;
pub use core::{ContextToken, Document, PitError, Result, ShardId, ShardReference};
pub use node::{FreeOutcome, PitNodeService, TermFilter, spawn_context_reaper};
pub use pit::{
    ALL_PITS, CreatePitRequest, CreatePitResponse, DeletePitInfo, DeletePitRequest,
    DeletePitResponse, ListPitResponse, PitDeleteCoordinator, PitInfo, PitSearchRequest,
    PitSearchResponse, PitService, ShardDeleteExecutor, ShardDeleteOutcome, decode_pit_id,
    encode_pit_id,
};
