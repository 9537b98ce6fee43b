use anyhow::Result;
use clap::Parser;
use profilegraph::{Config, ProfileGraph};

#[derive(Parser, Debug)]
#[command(name = "graph")]
#[command(about = "Print the ego graph of an actor as JSON")]
struct Args {
    /// Root actor id
    actor: String,

    /// Maximum hop distance from the root (default from config)
    #[arg(short = 'd', long)]
    max_depth: Option<usize>,

    /// New nodes admitted per degree (default from config)
    #[arg(short = 'n', long)]
    max_nodes: Option<usize>,

    /// Print only the statistics block
    #[arg(long)]
    stats_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.profilegraph.log_level)).init();
    let graph = ProfileGraph::open(config).await?;

    let defaults = &graph.config().graph;
    let max_depth = args.max_depth.unwrap_or(defaults.max_depth);
    let max_nodes = args.max_nodes.unwrap_or(defaults.max_nodes_per_degree);

    let result = graph.build_graph(&args.actor, max_depth, max_nodes).await;
    log::info!(
        "{} nodes, {} edges in {}ms",
        result.nodes.len(),
        result.edges.len(),
        result.stats.compute_time_ms
    );

    let json = if args.stats_only {
        serde_json::to_string_pretty(&result.stats)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", json);

    Ok(())
}
