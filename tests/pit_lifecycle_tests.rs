
use cluster_utils::{KEEP_ALIVE, TestCluster};
use pitkeeper::{
    CreatePitRequest, PitConfig, PitSearchRequest, ShardId, TermFilter, decode_pit_id,
    spawn_context_reaper,
};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_create_pit_opens_one_context_per_shard() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 5, 1, 4).await;

    let response = cluster
        .pits
        .create_pit(CreatePitRequest::new(KEEP_ALIVE, false).indices(["logs"]))
        .await
        .unwrap();
    assert_eq!(response.total_shards, 5);
    assert_eq!(response.shard_count(), 5);
    assert!(response.failed_shards.is_empty());

    let references = decode_pit_id(&response.id).unwrap();
    let mut shards = references
        .iter()
        .map(|reference| reference.shard.shard)
        .collect::<Vec<_>>();
    shards.sort();
    assert_eq!(shards, vec![0, 1, 2, 3, 4]);
    assert_eq!(cluster.open_contexts().await, 5);

    let listed = cluster.pits.list_all_pits().await.unwrap();
    assert_eq!(listed.pits.len(), 5);
    assert!(listed.pits.iter().all(|info| info.pit_id == response.id));
}

#[tokio::test]
async fn test_create_pit_falls_back_to_replica_copy() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 5, 1, 4).await;
    cluster.stop_node("node-1").await;

    let response = cluster
        .pits
        .create_pit(CreatePitRequest::new(KEEP_ALIVE, false).indices(["logs"]))
        .await
        .unwrap();
    assert_eq!(response.successful_shards, 5);
    let references = decode_pit_id(&response.id).unwrap();
    assert!(references.iter().all(|reference| reference.node_id != "node-1"));
}

#[tokio::test]
async fn test_create_pit_without_partial_releases_opened_contexts() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 5, 0, 4).await;
    cluster.stop_node("node-1").await;

    let err = cluster
        .pits
        .create_pit(CreatePitRequest::new(KEEP_ALIVE, false).indices(["logs"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("shards failed"), "{}", err);
    for node_id in ["node-0", "node-2"] {
        assert_eq!(cluster.node(node_id).await.open_context_count().unwrap(), 0);
    }
}

#[tokio::test]
async fn test_create_pit_with_partial_reports_failed_shards() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 5, 0, 4).await;
    cluster.stop_node("node-1").await;

    let response = cluster
        .pits
        .create_pit(CreatePitRequest::new(KEEP_ALIVE, true).indices(["logs"]))
        .await
        .unwrap();
    assert_eq!(response.total_shards, 5);
    assert_eq!(response.successful_shards, 3);
    let mut failed = response
        .failed_shards
        .iter()
        .map(|failure| failure.shard.shard)
        .collect::<Vec<_>>();
    failed.sort();
    assert_eq!(failed, vec![1, 4]);
    assert_eq!(decode_pit_id(&response.id).unwrap().len(), 3);
}

#[tokio::test]
async fn test_create_pit_rejects_unknown_index_and_bad_keep_alive() {
    let mut cluster = TestCluster::start(2).await;
    cluster.create_index("logs", 2, 1, 1).await;

    let err = cluster
        .pits
        .create_pit(CreatePitRequest::new(KEEP_ALIVE, false).indices(["missing"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing"), "{}", err);

    let err = cluster
        .pits
        .create_pit(CreatePitRequest::new(Duration::ZERO, false).indices(["logs"]))
        .await
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("keep"), "{}", err);
    assert_eq!(cluster.open_contexts().await, 0);
}

#[tokio::test]
async fn test_search_sees_point_in_time_view() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 5, 1, 10).await;
    let pit_id = cluster.create_pit(&["logs"]).await;

    let shard = ShardId::new("logs", 0);
    let holders = cluster.routing.read().unwrap().copies_for(&shard);
    for holder in holders {
        cluster
            .node(&holder)
            .await
            .shards()
            .index_document(&shard, json!({"doc": "late"}))
            .unwrap();
    }

    let response = cluster
        .pits
        .search(PitSearchRequest::new(pit_id.clone()).size(7))
        .await
        .unwrap();
    assert_eq!(response.total_shards, 5);
    assert_eq!(response.successful_shards, 5);
    assert_eq!(response.total_hits, 50);
    assert_eq!(response.hits.len(), 7);

    let fresh = cluster.create_pit(&["logs"]).await;
    let response = cluster
        .pits
        .search(PitSearchRequest::new(fresh))
        .await
        .unwrap();
    assert_eq!(response.total_hits, 51);
}

#[tokio::test]
async fn test_search_with_term_filter() {
    let mut cluster = TestCluster::start(2).await;
    cluster.create_index("logs", 4, 1, 10).await;
    let pit_id = cluster.create_pit(&["logs"]).await;

    let response = cluster
        .pits
        .search(PitSearchRequest::new(pit_id).term(TermFilter::new("doc", 3)))
        .await
        .unwrap();
    assert_eq!(response.total_hits, 4);
    assert!(response.hits.iter().all(|hit| hit["doc"] == json!(3)));
}

#[tokio::test]
async fn test_search_reports_partial_shard_failures() {
    let mut cluster = TestCluster::start(3).await;
    cluster.create_index("logs", 3, 0, 2).await;
    let pit_id = cluster.create_pit(&["logs"]).await;
    cluster.stop_node("node-2").await;

    let response = cluster
        .pits
        .search(PitSearchRequest::new(pit_id))
        .await
        .unwrap();
    assert_eq!(response.successful_shards, 2);
    assert_eq!(response.failed_shards.len(), 1);
    assert_eq!(response.failed_shards[0].node_id.as_deref(), Some("node-2"));
    assert_eq!(response.total_hits, 4);
}

#[tokio::test]
async fn test_search_with_invalid_id_fails() {
    let cluster = TestCluster::start(1).await;
    let err = cluster
        .pits
        .search(PitSearchRequest::new("nondecodableid"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid id"), "{}", err);
}

#[tokio::test]
async fn test_expired_pit_is_reaped_and_deletes_cleanly() {
    let config = PitConfig::new().reaper_interval(Duration::from_millis(20));
    let mut cluster = TestCluster::start_with_config(2, config).await;
    cluster.create_index("logs", 2, 1, 1).await;

    let response = cluster
        .pits
        .create_pit(CreatePitRequest::new(Duration::from_millis(50), false).indices(["logs"]))
        .await
        .unwrap();
    assert_eq!(cluster.open_contexts().await, 2);

    let mut reapers = Vec::new();
    for node_id in &cluster.node_ids {
        reapers.push(spawn_context_reaper(cluster.node(node_id).await).unwrap());
    }
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(cluster.open_contexts().await, 0);
    for reaper in reapers {
        reaper.stop().await.unwrap();
    }

    let err = cluster
        .pits
        .search(PitSearchRequest::new(response.id.clone()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("all shards failed"), "{}", err);

    let deleted = cluster.pits.delete_all_pits().await.unwrap();
    assert!(deleted.results.is_empty());
}
