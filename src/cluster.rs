use crate::core::{ContextToken, PitError, Result, ShardId};
use crate::node::{
    FreeOutcome, ListedContext, PitNodeService, ShardSearchRequest, ShardSearchResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

// Cluster collaborators are split by responsibility for easier navigation.
include!("cluster/membership.rs");
include!("cluster/routing.rs");
include!("cluster/transport.rs");
include!("cluster/in_memory_transport.rs");
