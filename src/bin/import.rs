use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use profilegraph::ingest::{discover_payloads, AdapterRegistry, PayloadFile};
use profilegraph::{Config, ProfileGraph, TransformOptions};

#[derive(Parser, Debug)]
#[command(name = "import")]
#[command(about = "Import provider profile payloads into the profile graph")]
struct Args {
    /// Payload file or directory of .json payloads
    path: PathBuf,

    /// Source tag used in entity keys (e.g. linkedin)
    #[arg(short, long)]
    source: String,

    /// Actor the imported contacts are linked to
    #[arg(short, long)]
    actor: String,

    /// Adapter for the payload shape
    #[arg(short, long, default_value = "generic")]
    provider: String,

    /// Context event the actor met these people at
    #[arg(long)]
    event: Option<String>,

    /// Recompute inferred edges for every imported contact afterwards
    #[arg(short, long)]
    recompute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.profilegraph.log_level)).init();
    log::info!("Database path: {}", config.db_path().display());

    let graph = ProfileGraph::open(config).await?;
    let registry = AdapterRegistry::new();
    if registry.find(&args.provider).is_none() {
        anyhow::bail!(
            "Unknown provider {} (available: {})",
            args.provider,
            registry.providers().join(", ")
        );
    }

    let files = discover_payloads(&args.path)?;
    if files.is_empty() {
        log::warn!("No payload files found under {}", args.path.display());
        return Ok(());
    }

    let start = Instant::now();
    let mut imported = 0usize;
    let mut errors = 0usize;
    let mut contact_ids = Vec::new();

    for (idx, file) in files.iter().enumerate() {
        log::info!("[{}/{}] Importing: {}", idx + 1, files.len(), file.relative_path);
        match import_file(&graph, &registry, &args, file).await {
            Ok((ids, failed)) => {
                imported += ids.len();
                errors += failed;
                contact_ids.extend(ids);
            }
            Err(e) => {
                errors += 1;
                log::error!("✗ {}: {:#}", file.relative_path, e);
            }
        }
    }

    if args.recompute {
        contact_ids.sort_unstable();
        contact_ids.dedup();
        let mut edges = 0;
        for contact_id in &contact_ids {
            match graph.recompute_edges(*contact_id).await {
                Ok(n) => edges += n,
                Err(e) => log::warn!("Edge recompute failed for contact {}: {}", contact_id, e),
            }
        }
        log::info!("Recomputed edges for {} contacts ({} edges)", contact_ids.len(), edges);
    }

    log::info!("=== Import Complete ===");
    log::info!("Files: {}", files.len());
    log::info!("Profiles imported: {} (errors: {})", imported, errors);
    log::info!("Time: {:?}", start.elapsed());
    if errors > 0 {
        log::warn!("Some profiles failed to import. Check logs above for details.");
    }

    Ok(())
}

/// Import every profile in one payload file; returns imported contact ids and failure count.
async fn import_file(
    graph: &ProfileGraph,
    registry: &AdapterRegistry,
    args: &Args,
    file: &PayloadFile,
) -> Result<(Vec<i64>, usize)> {
    let content = std::fs::read_to_string(&file.absolute_path)
        .with_context(|| format!("Failed to read {}", file.absolute_path.display()))?;
    let records = registry.parse(&args.provider, &content)?;

    let mut ids = Vec::with_capacity(records.len());
    let mut failed = 0;
    for record in &records {
        let mut options = TransformOptions::new(&args.source).with_actor(&args.actor);
        if let Some(event) = &args.event {
            options = options.with_event(event);
        }
        match graph.import_profile(&args.actor, record, &options).await {
            Ok(outcome) => {
                log::info!(
                    "✓ {} → contact {} ({} facts)",
                    outcome.entity_key,
                    outcome.resolution.contact_id,
                    outcome.facts.facts
                );
                ids.push(outcome.resolution.contact_id);
            }
            Err(e) => {
                failed += 1;
                log::error!("✗ {} in {}: {}", record.name, file.relative_path, e);
            }
        }
    }
    Ok((ids, failed))
}
