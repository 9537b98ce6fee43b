use anyhow::Result;
use clap::Parser;
use profilegraph::{Config, ProfileGraph};

#[derive(Parser, Debug)]
#[command(name = "recompute")]
#[command(about = "Recompute inferred edges for one contact or all of them")]
struct Args {
    /// Contact to recompute; every contact when omitted
    #[arg(short, long)]
    contact: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.profilegraph.log_level)).init();
    let graph = ProfileGraph::open(config).await?;

    match args.contact {
        Some(contact_id) => {
            let edges = graph.recompute_edges(contact_id).await?;
            println!("Contact {}: {} edges", contact_id, edges);
        }
        None => {
            let report = graph.recompute_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
