use pitkeeper::{
    ClusterMembership, ClusterView, FreeOutcome, InMemoryClusterView, InMemoryPitTransport,
    IndexRoutingTable, PitConfig, PitError, PitNodeService, PitTransport, ShardId,
};
use std::sync::Arc;
use std::time::Duration;

fn nodes(count: usize) -> Vec<String> {
    (0..count).map(|n| format!("node-{}", n)).collect()
}

#[test]
fn test_routing_spreads_copies_without_duplicates() {
    let mut routing = IndexRoutingTable::new();
    let shards = routing.add_index("logs", 4, 2, &nodes(3)).unwrap();
    assert_eq!(shards.len(), 4);

    for shard in &shards {
        let copies = routing.copies_for(shard);
        assert_eq!(copies.len(), 3);
        assert_eq!(copies[0], format!("node-{}", shard.shard % 3));
    }
    routing.validate().unwrap();
}

#[test]
fn test_routing_rejects_invalid_layouts() {
    let mut routing = IndexRoutingTable::new();
    assert!(routing.add_index("logs", 0, 0, &nodes(2)).is_err());
    assert!(routing.add_index("logs", 2, 2, &nodes(2)).is_err());
    assert!(routing.add_index(" ", 2, 0, &nodes(2)).is_err());

    routing.add_index("logs", 2, 0, &nodes(2)).unwrap();
    let err = routing
        .set_shard_copies(&ShardId::new("logs", 5), vec!["node-0".to_string()])
        .unwrap_err();
    assert!(matches!(err, PitError::ShardNotFound(_)));

    routing
        .set_shard_copies(
            &ShardId::new("logs", 1),
            vec!["node-1".to_string(), "node-1".to_string(), "node-0".to_string()],
        )
        .unwrap();
    assert_eq!(
        routing.copies_for(&ShardId::new("logs", 1)),
        vec!["node-1".to_string(), "node-0".to_string()]
    );
    assert!(matches!(
        routing.shards_of("missing"),
        Err(PitError::IndexNotFound(_))
    ));
    assert!(routing.remove_index("logs"));
    assert!(routing.indices().is_empty());
}

#[test]
fn test_cluster_view_tracks_membership() {
    let view = InMemoryClusterView::new(ClusterMembership::from_nodes(nodes(3)).unwrap());
    assert!(view.is_member("node-1"));
    assert_eq!(view.member_nodes(), nodes(3));

    assert!(view.leave("node-1").unwrap());
    assert!(!view.leave("node-1").unwrap());
    assert!(!view.is_member("node-1"));

    view.join("node-9").unwrap();
    assert_eq!(
        view.member_nodes(),
        vec!["node-0".to_string(), "node-2".to_string(), "node-9".to_string()]
    );
    assert!(view.join("").is_err());
}

#[test]
fn test_membership_tells_departed_from_unknown_nodes() {
    let membership = ClusterMembership::from_nodes(["node-0", "node-1"]).unwrap();
    let view = InMemoryClusterView::new(membership);
    assert!(view.leave("node-1").unwrap());

    let snapshot = view.snapshot().unwrap();
    assert!(snapshot.has_departed("node-1"));
    assert!(!snapshot.has_departed("node-5"));
    assert!(!snapshot.is_member("node-5"));

    view.join("node-1").unwrap();
    let snapshot = view.snapshot().unwrap();
    assert!(snapshot.is_member("node-1"));
    assert!(!snapshot.has_departed("node-1"));
    assert_eq!(snapshot.members(), nodes(2));
}

#[tokio::test]
async fn test_in_memory_transport_disconnect_and_restart() {
    let transport = InMemoryPitTransport::new();
    let shard = ShardId::new("logs", 0);
    let service = Arc::new(PitNodeService::new("node-0", PitConfig::new()).unwrap());
    service.shards().host(shard.clone()).unwrap();
    transport.register_node(Arc::clone(&service)).await;

    let token = transport
        .open_context("node-0", &shard, Duration::from_secs(30))
        .await
        .unwrap();

    transport.disconnect("node-0").await.unwrap();
    let err = transport
        .free_contexts("node-0", vec![token.clone()])
        .await
        .unwrap_err();
    assert!(err.is_unreachable());
    assert!(err.to_string().contains("Node not connected"));

    let restarted = Arc::new(PitNodeService::new("node-0", PitConfig::new()).unwrap());
    transport.reconnect(restarted).await;
    let outcomes = transport.free_contexts("node-0", vec![token]).await.unwrap();
    assert_eq!(outcomes, vec![FreeOutcome::NotFound]);

    assert!(transport.list_contexts("node-7").await.is_err());
}
