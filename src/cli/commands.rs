//! CLI command definitions and handlers.
//!
//! Each subcommand is implemented as a function that takes the parsed
//! arguments and returns an `anyhow::Result<()>`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config;
use crate::db;
use crate::graph::{self, Layers, NodeKey, PersonalGraph};
use crate::harvest::{HarvestEngine, HarvestStats};
use crate::process::PostIngestionProcessor;
use crate::source::ApiClient;

/// Soundgraph CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database file (default: soundgraph.db in the current directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Deep-harvest the social graph around a seed track
    Harvest {
        /// Public track URL to resolve and harvest
        url: Option<String>,
        /// Harvest an already-cached track by id instead of a URL
        #[arg(long, conflicts_with = "url")]
        track_id: Option<i64>,
        /// Public client id (overrides the config file)
        #[arg(long, env = "SOUNDGRAPH_CLIENT_ID")]
        client_id: Option<String>,
        /// OAuth access token (overrides the config file)
        #[arg(long, env = "SOUNDGRAPH_ACCESS_TOKEN")]
        access_token: Option<String>,
    },
    /// Derive similarity, co-occurrence and artist relationships
    Process,
    /// Build the personal graph from a seed track and export a snapshot
    Build {
        /// Seed track id, must already be harvested
        seed: i64,
        /// Relationship layers to include, e.g. "1,2,4"
        #[arg(long, default_value = "1,2,3,4")]
        layers: String,
        /// BFS depth (overrides the config file)
        #[arg(long)]
        depth: Option<usize>,
        /// Snapshot output path
        #[arg(short, long, default_value = "graph.json")]
        output: PathBuf,
    },
    /// Two-hop collaborative-filtering recommendations for a track
    Recommend {
        /// Seed track id
        seed: i64,
        /// Maximum recommendations to print
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Minimum distinct connecting neighbors per candidate
        #[arg(long, default_value = "2")]
        min_common: usize,
    },
    /// Shortest path between two tracks in the personal graph
    Path {
        /// Source track id
        from: i64,
        /// Destination track id
        to: i64,
    },
    /// Cache statistics, or graph statistics for a saved snapshot
    Stats {
        /// Print statistics for this snapshot instead of the cache
        #[arg(long)]
        graph: Option<PathBuf>,
    },
}

/// Run the parsed CLI command to completion.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Harvest {
            url,
            track_id,
            client_id,
            access_token,
        } => cmd_harvest(
            &rt,
            cli.db.as_deref(),
            url.as_deref(),
            *track_id,
            client_id.as_deref(),
            access_token.as_deref(),
        ),
        Commands::Process => cmd_process(&rt, cli.db.as_deref()),
        Commands::Build {
            seed,
            layers,
            depth,
            output,
        } => cmd_build(&rt, cli.db.as_deref(), *seed, layers, *depth, output),
        Commands::Recommend {
            seed,
            limit,
            min_common,
        } => cmd_recommend(&rt, cli.db.as_deref(), *seed, *limit, *min_common),
        Commands::Path { from, to } => cmd_path(&rt, cli.db.as_deref(), *from, *to),
        Commands::Stats { graph } => cmd_stats(&rt, cli.db.as_deref(), graph.as_deref()),
    }
}

async fn open_db(db_path: Option<&Path>) -> anyhow::Result<SqlitePool> {
    let url = db::db_url(db_path);
    db::init_db(&url)
        .await
        .with_context(|| format!("opening database {url}"))
}

/// Parse a comma-separated layer list like "1,2,4".
fn parse_layers(spec: &str) -> anyhow::Result<Layers> {
    let mut layers = Layers::empty();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: u8 = part
            .parse()
            .ok()
            .filter(|n| Layers::from_number(*n).is_some())
            .with_context(|| format!("invalid layer {part:?}, expected 1-4"))?;
        layers |= Layers::from_number(n).unwrap_or(Layers::TRACK_TRACK);
    }
    if layers.is_empty() {
        bail!("no layers selected");
    }
    Ok(layers)
}

fn print_harvest_stats(stats: &HarvestStats) {
    println!("Harvest complete:");
    println!("  tracks collected:    {}", stats.tracks_collected);
    println!("  users collected:     {}", stats.users_collected);
    println!("  playlists collected: {}", stats.playlists_collected);
    println!("  artists collected:   {}", stats.artists_collected);
    println!("  labels detected:     {}", stats.labels_detected);
    println!("  entities extracted:  {}", stats.entities_extracted);
    println!("  API requests:        {}", stats.api_requests);
    if stats.sub_fetch_failures > 0 {
        println!("  fetch failures:      {} (partial results kept)", stats.sub_fetch_failures);
    }
}

// ============================================================================
// Individual command implementations
// ============================================================================

fn cmd_harvest(
    rt: &Runtime,
    db_path: Option<&Path>,
    url: Option<&str>,
    track_id: Option<i64>,
    client_id: Option<&str>,
    access_token: Option<&str>,
) -> anyhow::Result<()> {
    let mut config = config::load();
    if let Some(id) = client_id {
        config.source.client_id = Some(id.to_string());
    }
    if let Some(token) = access_token {
        config.source.access_token = Some(token.to_string());
    }

    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let client = ApiClient::from_config(&config.source).context("building API client")?;
        let engine = HarvestEngine::new(&client, &pool, config.harvest.clone());

        let stats = match (url, track_id) {
            (Some(url), _) => engine.harvest_url(url).await?,
            (None, Some(id)) => engine.harvest_cached(id).await?,
            (None, None) => bail!("provide a track URL or --track-id"),
        };
        print_harvest_stats(&stats);
        Ok(())
    })
}

fn cmd_process(rt: &Runtime, db_path: Option<&Path>) -> anyhow::Result<()> {
    let config = config::load();
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let processor = PostIngestionProcessor::new(&pool, config.processing.clone());
        let stats = processor.process_all().await.context("deriving relationships")?;
        println!("Processing complete:");
        println!("  user similarities:    {}", stats.user_similarities);
        println!("  track relationships:  {}", stats.track_relationships);
        println!("  artist relationships: {}", stats.artist_relationships);
        Ok(())
    })
}

fn cmd_build(
    rt: &Runtime,
    db_path: Option<&Path>,
    seed: i64,
    layers: &str,
    depth: Option<usize>,
    output: &Path,
) -> anyhow::Result<()> {
    let mut config = config::load();
    if let Some(depth) = depth {
        config.graph.max_depth = depth;
    }
    let layers = parse_layers(layers)?;

    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let graph = PersonalGraph::build_from_seed(&pool, seed, layers, &config.graph)
            .await
            .context("building personal graph")?;
        graph::export_graph(&graph, output)
            .with_context(|| format!("writing snapshot {}", output.display()))?;
        println!(
            "Graph built: {} nodes, {} edges -> {}",
            graph.node_count(),
            graph.edge_count(),
            output.display()
        );
        Ok(())
    })
}

fn cmd_recommend(
    rt: &Runtime,
    db_path: Option<&Path>,
    seed: i64,
    limit: usize,
    min_common: usize,
) -> anyhow::Result<()> {
    let config = config::load();
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let graph = PersonalGraph::build_from_seed(&pool, seed, Layers::all(), &config.graph)
            .await
            .context("building personal graph")?;

        let recs = graph.recommendations(seed, limit, min_common);
        if recs.is_empty() {
            println!("No recommendations; harvest and process more data first.");
            return Ok(());
        }
        for (rank, rec) in recs.iter().enumerate() {
            println!(
                "{:>2}. [{:.2}] {} - {} ({} common neighbors)",
                rank + 1,
                rec.score,
                rec.artist_name.as_deref().unwrap_or("unknown artist"),
                rec.title,
                rec.common_neighbors
            );
        }
        Ok(())
    })
}

fn cmd_path(rt: &Runtime, db_path: Option<&Path>, from: i64, to: i64) -> anyhow::Result<()> {
    let config = config::load();
    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let graph = PersonalGraph::build_from_seed(&pool, from, Layers::all(), &config.graph)
            .await
            .context("building personal graph")?;

        match graph.shortest_path(NodeKey::Track(from), NodeKey::Track(to)) {
            Some(path) => {
                let hops: Vec<String> = path.iter().map(|k| k.to_string()).collect();
                println!("{}", hops.join(" -> "));
            }
            None => println!("No path from {from} to {to} in the built graph."),
        }
        Ok(())
    })
}

fn cmd_stats(rt: &Runtime, db_path: Option<&Path>, snapshot: Option<&Path>) -> anyhow::Result<()> {
    if let Some(snapshot) = snapshot {
        let graph = graph::import_graph(snapshot)
            .with_context(|| format!("loading snapshot {}", snapshot.display()))?;
        let stats = graph.stats();
        println!("Graph statistics:");
        println!("  nodes:        {} ({} tracks, {} users, {} artists)",
            stats.nodes, stats.track_nodes, stats.user_nodes, stats.artist_nodes);
        println!("  edges:        {}", stats.edges);
        println!(
            "  layer edges:  L1={} L2={} L3={} L4={}",
            stats.layer_edges[0], stats.layer_edges[1], stats.layer_edges[2], stats.layer_edges[3]
        );
        println!("  density:      {:.6}", stats.density);
        println!(
            "  degree:       avg {:.2}, min {}, max {}",
            stats.avg_degree, stats.min_degree, stats.max_degree
        );
        match stats.connected_components {
            Some(n) => println!("  components:   {n}"),
            None => println!("  components:   skipped (graph too large)"),
        }
        return Ok(());
    }

    rt.block_on(async {
        let pool = open_db(db_path).await?;
        let stats = db::get_cache_stats(&pool).await.context("reading cache stats")?;
        println!("Cache statistics:");
        println!("  tracks:               {}", stats.tracks);
        println!("  users:                {}", stats.users);
        println!("  playlists:            {}", stats.playlists);
        println!("  playlist memberships: {}", stats.playlist_tracks);
        println!("  related tracks:       {}", stats.related_tracks);
        println!("  user engagements:     {}", stats.user_engagements);
        println!("  user similarities:    {}", stats.user_similarities);
        println!("  user follows:         {}", stats.user_follows);
        println!("  artist relationships: {}", stats.artist_relationships);
        Ok(())
    })
}
