/// Nodes the coordinator trusts to hold PIT contexts, plus the nodes that
/// have left since. A departed node's contexts are treated as reclaimed.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ClusterMembership {
    #[serde(default)]
    members: BTreeSet<String>,
    #[serde(default)]
    departed: BTreeSet<String>,
}

impl ClusterMembership {
    pub fn from_nodes<I, S>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut membership = Self::default();
        for node in nodes {
            membership.join(node)?;
        }
        Ok(membership)
    }

    /// Admits a node, including one that left earlier and came back.
    pub fn join(&mut self, node_id: impl Into<String>) -> Result<()> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(PitError::ExecutionError("cluster node id must not be empty".to_string()));
        }
        self.departed.remove(&node_id);
        self.members.insert(node_id);
        Ok(())
    }

    /// Moves a member to the departed set. False if it was not a member.
    pub fn leave(&mut self, node_id: &str) -> bool {
        if !self.members.remove(node_id) {
            return false;
        }
        self.departed.insert(node_id.to_string());
        true
    }

    pub fn is_member(&self, node_id: &str) -> bool {
        self.members.contains(node_id)
    }

    /// True for a node that was a member and left; false for one never seen.
    pub fn has_departed(&self, node_id: &str) -> bool {
        self.departed.contains(node_id)
    }

    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }
}

/// Read side of cluster membership as seen by the PIT coordinator.
///
/// A node that is a member but cannot be contacted is considered transiently
/// lost; a node that has left the view is considered gone together with the
/// contexts it held.
pub trait ClusterView: Send + Sync {
    fn is_member(&self, node_id: &str) -> bool;

    /// Sorted ids of every member node.
    fn member_nodes(&self) -> Vec<String>;
}

/// Mutable, shareable membership used by in-process clusters and tests.
#[derive(Debug, Default)]
pub struct InMemoryClusterView {
    membership: RwLock<ClusterMembership>,
}

impl InMemoryClusterView {
    pub fn new(membership: ClusterMembership) -> Self {
        Self {
            membership: RwLock::new(membership),
        }
    }

    pub fn join(&self, node_id: impl Into<String>) -> Result<()> {
        self.membership.write()?.join(node_id)
    }

    /// Drops a node from the view. Returns true if it was a member.
    pub fn leave(&self, node_id: &str) -> Result<bool> {
        Ok(self.membership.write()?.leave(node_id))
    }

    pub fn snapshot(&self) -> Result<ClusterMembership> {
        Ok(self.membership.read()?.clone())
    }
}

impl ClusterView for InMemoryClusterView {
    fn is_member(&self, node_id: &str) -> bool {
        self.membership
            .read()
            .map(|membership| membership.is_member(node_id))
            .unwrap_or(false)
    }

    fn member_nodes(&self) -> Vec<String> {
        self.membership
            .read()
            .map(|membership| membership.members())
            .unwrap_or_default()
    }
}
