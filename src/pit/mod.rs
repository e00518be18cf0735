//! Cluster-level point-in-time lifecycle: id codec, create, search and delete.

pub mod coordinator;
pub mod create;
pub mod executor;
pub mod id;
pub mod search;
pub mod types;

pub use coordinator::PitDeleteCoordinator;
pub use create::PitCreator;
pub use executor::{ShardDeleteExecutor, ShardDeleteOutcome};
pub use id::{decode_pit_id, encode_pit_id};
pub use search::PitSearcher;
pub use types::{
    ALL_PITS, CreatePitRequest, CreatePitResponse, DeletePitInfo, DeletePitRequest,
    DeletePitResponse, ListPitResponse, PitInfo, PitSearchRequest, PitSearchResponse,
    ShardFailure,
};

use crate::cluster::{ClusterView, IndexRoutingTable, PitTransport};
use crate::config::PitConfig;
use crate::core::Result;
use std::sync::{Arc, RwLock};

/// Coordinating-node entry point wiring create, search and delete to one
/// transport, routing table and cluster view.
pub struct PitService {
    creator: PitCreator,
    searcher: PitSearcher,
    deleter: PitDeleteCoordinator,
}

impl PitService {
    pub fn new(
        config: PitConfig,
        routing: Arc<RwLock<IndexRoutingTable>>,
        transport: Arc<dyn PitTransport>,
        view: Arc<dyn ClusterView>,
    ) -> Result<Self> {
        config.validate()?;
        routing.read()?.validate()?;
        Ok(Self {
            creator: PitCreator::new(
                config.clone(),
                routing,
                Arc::clone(&transport),
                Arc::clone(&view),
            ),
            searcher: PitSearcher::new(config.clone(), Arc::clone(&transport)),
            deleter: PitDeleteCoordinator::new(transport, view, &config),
        })
    }

    pub async fn create_pit(&self, request: CreatePitRequest) -> Result<CreatePitResponse> {
        self.creator.create(request).await
    }

    pub async fn search(&self, request: PitSearchRequest) -> Result<PitSearchResponse> {
        self.searcher.search(request).await
    }

    pub async fn delete_pits(&self, request: DeletePitRequest) -> Result<DeletePitResponse> {
        self.deleter.execute(request).await
    }

    pub async fn delete_all_pits(&self) -> Result<DeletePitResponse> {
        self.deleter.delete_all().await
    }

    pub async fn list_all_pits(&self) -> Result<ListPitResponse> {
        self.deleter.list_all().await
    }
}
