use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use pitkeeper::{
    ClusterMembership, CreatePitRequest, InMemoryClusterView, InMemoryPitTransport,
    IndexRoutingTable, PitConfig, PitNodeService, PitService, decode_pit_id,
};
use serde_json::json;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pit-tool")]
#[command(about = "Developer tooling for point-in-time ids and in-memory clusters")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the shard references encoded in a PIT id
    Decode { id: String },
    /// Create one PIT per index on an in-memory cluster, then delete them all
    Simulate {
        #[arg(long, default_value_t = 3)]
        nodes: usize,
        #[arg(long, default_value_t = 2)]
        indices: usize,
        #[arg(long, default_value_t = 5)]
        shards: u32,
        #[arg(long, default_value_t = 60)]
        keep_alive_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Decode { id } => decode(&id),
        Command::Simulate {
            nodes,
            indices,
            shards,
            keep_alive_secs,
        } => simulate(nodes, indices, shards, Duration::from_secs(keep_alive_secs)).await,
    }
}

fn decode(id: &str) -> Result<()> {
    let references = decode_pit_id(id).context("Failed to decode PIT id")?;
    println!("{}", serde_json::to_string_pretty(&references)?);
    Ok(())
}

async fn simulate(nodes: usize, indices: usize, shards: u32, keep_alive: Duration) -> Result<()> {
    if nodes == 0 || indices == 0 {
        return Err(anyhow!("--nodes and --indices must be at least 1"));
    }
    let config = PitConfig::new();
    let node_ids = (0..nodes).map(|n| format!("node-{}", n)).collect::<Vec<_>>();

    let transport = InMemoryPitTransport::new();
    let mut services = Vec::new();
    for node_id in &node_ids {
        let service = Arc::new(PitNodeService::new(node_id.clone(), config.clone())?);
        transport.register_node(Arc::clone(&service)).await;
        services.push(service);
    }

    let mut routing = IndexRoutingTable::new();
    let replicas = usize::min(1, nodes - 1);
    let index_names = (0..indices).map(|i| format!("index-{}", i)).collect::<Vec<_>>();
    for index in &index_names {
        for shard in routing
            .add_index(index.clone(), shards, replicas, &node_ids)
            .with_context(|| format!("Failed to route index '{}'", index))?
        {
            for holder in routing.copies_for(&shard) {
                let service = services
                    .iter()
                    .find(|service| service.node_id() == holder)
                    .ok_or_else(|| anyhow!("no service for node '{}'", holder))?;
                service.shards().host(shard.clone())?;
                service
                    .shards()
                    .index_document(&shard, json!({"index": index, "shard": shard.shard}))?;
            }
        }
    }

    let view = InMemoryClusterView::new(ClusterMembership::from_nodes(node_ids.clone())?);
    let pits = PitService::new(
        config,
        Arc::new(RwLock::new(routing)),
        Arc::new(transport),
        Arc::new(view),
    )?;

    let mut created = Vec::new();
    for index in &index_names {
        let response = pits
            .create_pit(CreatePitRequest::new(keep_alive, false).indices([index.clone()]))
            .await
            .with_context(|| format!("Failed to create PIT on '{}'", index))?;
        created.push(response);
    }
    let listed = pits.list_all_pits().await?;
    let deleted = pits.delete_all_pits().await?;

    let report = json!({
        "created": created,
        "listed_contexts": listed.pits.len(),
        "deleted": deleted,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
