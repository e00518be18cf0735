/// Represents a peer node in the in-memory cluster.
#[derive(Clone)]
struct InMemoryPeer {
    service: Arc<PitNodeService>,
    connected: bool,
    response_delay: Option<Duration>,
}

/// An in-memory implementation of `PitTransport` for tests and tooling.
///
/// Simulates network transmission by invoking peer services directly.
/// Stopping a node leaves it registered but disconnected; restarting it
/// swaps in a fresh service, which starts with no contexts.
#[derive(Clone, Default)]
pub struct InMemoryPitTransport {
    peers: Arc<Mutex<HashMap<String, InMemoryPeer>>>,
}

impl InMemoryPitTransport {
    /// Creates a new, empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a node service and marks it connected.
    pub async fn register_node(&self, service: Arc<PitNodeService>) {
        let mut peers = self.peers.lock().await;
        peers.insert(
            service.node_id().to_string(),
            InMemoryPeer {
                service,
                connected: true,
                response_delay: None,
            },
        );
    }

    /// Simulates a stopped node: further calls fail with `NodeNotConnected`.
    pub async fn disconnect(&self, node_id: &str) -> Result<()> {
        let mut peers = self.peers.lock().await;
        let peer = peers
            .get_mut(node_id)
            .ok_or_else(|| PitError::NodeNotConnected(node_id.to_string()))?;
        peer.connected = false;
        Ok(())
    }

    /// Simulates a restarted node by registering its new service instance.
    pub async fn reconnect(&self, service: Arc<PitNodeService>) {
        self.register_node(service).await;
    }

    /// Delays every answer from `node_id`, simulating a hung node.
    pub async fn set_response_delay(&self, node_id: &str, delay: Option<Duration>) -> Result<()> {
        let mut peers = self.peers.lock().await;
        let peer = peers
            .get_mut(node_id)
            .ok_or_else(|| PitError::NodeNotConnected(node_id.to_string()))?;
        peer.response_delay = delay;
        Ok(())
    }

    /// Returns the currently registered service for `node_id`.
    pub async fn node(&self, node_id: &str) -> Option<Arc<PitNodeService>> {
        let peers = self.peers.lock().await;
        peers.get(node_id).map(|peer| Arc::clone(&peer.service))
    }

    async fn connected_peer(&self, node_id: &str) -> Result<Arc<PitNodeService>> {
        let peer = {
            let peers = self.peers.lock().await;
            peers
                .get(node_id)
                .filter(|peer| peer.connected)
                .cloned()
                .ok_or_else(|| PitError::NodeNotConnected(node_id.to_string()))?
        };
        if let Some(delay) = peer.response_delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        Ok(peer.service)
    }
}

#[async_trait]
impl PitTransport for InMemoryPitTransport {
    async fn open_context(
        &self,
        target_node: &str,
        shard: &ShardId,
        keep_alive: Duration,
    ) -> Result<ContextToken> {
        let service = self.connected_peer(target_node).await?;
        service.open_reader_context(shard, keep_alive)
    }

    async fn free_contexts(
        &self,
        target_node: &str,
        tokens: Vec<ContextToken>,
    ) -> Result<Vec<FreeOutcome>> {
        let service = self.connected_peer(target_node).await?;
        service.free_contexts(&tokens)
    }

    async fn attach_pit_id(
        &self,
        target_node: &str,
        tokens: Vec<ContextToken>,
        pit_id: String,
    ) -> Result<usize> {
        let service = self.connected_peer(target_node).await?;
        service.attach_pit_id(&tokens, &pit_id)
    }

    async fn list_contexts(&self, target_node: &str) -> Result<Vec<ListedContext>> {
        let service = self.connected_peer(target_node).await?;
        service.list_contexts()
    }

    async fn search_shard(
        &self,
        target_node: &str,
        token: ContextToken,
        keep_alive: Option<Duration>,
        request: ShardSearchRequest,
    ) -> Result<ShardSearchResult> {
        let service = self.connected_peer(target_node).await?;
        service.search_shard(&token, keep_alive, &request)
    }
}
