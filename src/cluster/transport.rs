/// Node-to-node calls needed by the point-in-time lifecycle.
///
/// Implementations report a node that cannot be contacted with
/// [`PitError::NodeNotConnected`]; callers bound every call with their own
/// timeout.
#[async_trait]
pub trait PitTransport: Send + Sync {
    /// Opens a reader context for `shard` on `target_node`.
    async fn open_context(
        &self,
        target_node: &str,
        shard: &ShardId,
        keep_alive: Duration,
    ) -> Result<ContextToken>;

    /// Frees contexts on `target_node`, one outcome per token in input order.
    async fn free_contexts(
        &self,
        target_node: &str,
        tokens: Vec<ContextToken>,
    ) -> Result<Vec<FreeOutcome>>;

    /// Records the composite PIT id on contexts held by `target_node`.
    async fn attach_pit_id(
        &self,
        target_node: &str,
        tokens: Vec<ContextToken>,
        pit_id: String,
    ) -> Result<usize>;

    /// Enumerates the live contexts held by `target_node`.
    async fn list_contexts(&self, target_node: &str) -> Result<Vec<ListedContext>>;

    /// Runs a shard-level search against a reader context.
    async fn search_shard(
        &self,
        target_node: &str,
        token: ContextToken,
        keep_alive: Option<Duration>,
        request: ShardSearchRequest,
    ) -> Result<ShardSearchResult>;
}
