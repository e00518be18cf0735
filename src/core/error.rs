use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PitError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("No search context found for id [{token}] on node '{node_id}'")]
    ContextNotFound { node_id: String, token: String },

    #[error("Node not connected: '{0}'")]
    NodeNotConnected(String),

    #[error("Node '{node_id}' did not answer within {timeout_ms}ms")]
    NodeTimeout { node_id: String, timeout_ms: u64 },

    #[error("Search phase failed: {0}")]
    SearchPhaseFailed(String),

    #[error("Node '{node_id}' already holds the maximum of {limit} open point-in-time contexts")]
    TooManyContexts { node_id: String, limit: usize },

    #[error("Invalid keep-alive: {0}")]
    InvalidKeepAlive(String),

    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Shard {0} not found")]
    ShardNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl PitError {
    /// True when the failure means the target node could not be contacted at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NodeNotConnected(_) | Self::NodeTimeout { .. })
    }

    pub fn is_context_missing(&self) -> bool {
        matches!(self, Self::ContextNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, PitError>;

impl<T> From<std::sync::PoisonError<T>> for PitError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for PitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
