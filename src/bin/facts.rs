use anyhow::Result;
use clap::Parser;
use profilegraph::{Config, FactPattern, ProfileGraph};

#[derive(Parser, Debug)]
#[command(name = "facts")]
#[command(about = "Query stored facts by subject, predicate and/or object")]
struct Args {
    /// Subject key, e.g. person:linkedin:linkedin-com-in-jane-doe
    #[arg(short, long)]
    subject: Option<String>,

    /// Predicate, e.g. schema:worksFor
    #[arg(short, long)]
    predicate: Option<String>,

    /// Object value or referenced key
    #[arg(short, long)]
    object: Option<String>,

    #[arg(short, long, default_value_t = 100)]
    limit: usize,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.profilegraph.log_level)).init();
    if args.subject.is_none() && args.predicate.is_none() && args.object.is_none() {
        anyhow::bail!("Usage: facts [--subject <key>] [--predicate <uri>] [--object <value>] (at least one)");
    }

    let graph = ProfileGraph::open(config).await?;
    let pattern = FactPattern {
        subject: args.subject,
        predicate: args.predicate,
        object: args.object,
        limit: Some(args.limit),
    };
    let facts = graph.query_facts_fresh(&pattern).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }

    if facts.is_empty() {
        println!("No facts found.");
        return Ok(());
    }
    println!("{:-<100}", "");
    println!("{:<36} {:<26} {:<9} {}", "Subject", "Predicate", "Kind", "Object");
    println!("{:-<100}", "");
    for fact in &facts {
        println!(
            "{:<36} {:<26} {:<9} {}",
            fact.subject, fact.predicate, fact.object_kind, fact.object
        );
    }
    println!("{:-<100}", "");
    println!("{} facts", facts.len());

    Ok(())
}
