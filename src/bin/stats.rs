use profilegraph::{Config, ProfileGraph, ProfileGraphError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.profilegraph.log_level)).init();

    let graph = ProfileGraph::open(config).await?;

    println!("\n=== ProfileGraph Statistics ===\n");

    let counts = graph.counts().await?;
    println!("{:<24} {:>10}", "Contacts", counts.contacts);
    println!("{:<24} {:>10}", "Actor links", counts.actor_links);
    println!("{:<24} {:>10}", "Facts", counts.facts);
    println!("{:<24} {:>10}", "Fact subjects", counts.subjects);
    println!("{:<24} {:>10}", "Inferred edges", counts.inferred_edges);
    println!("{:<24} {:>10}", "Contributions", counts.contributions);

    // Edge breakdown by type
    let by_type = graph
        .db()
        .with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT edge_type, COUNT(*), AVG(strength), MAX(strength)
                FROM inferred_edges
                GROUP BY edge_type
                ORDER BY COUNT(*) DESC
                "#,
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ));
            }
            Ok::<Vec<_>, ProfileGraphError>(results)
        })
        .await?;

    if by_type.is_empty() {
        println!("\nNo inferred edges yet. Run `recompute` to derive them.");
    } else {
        println!("\nInferred Edges by Type:\n");
        println!("{:-<60}", "");
        println!("{:<24} {:>10} {:>12} {:>10}", "Type", "Count", "Avg strength", "Max");
        println!("{:-<60}", "");
        for (edge_type, count, avg, max) in &by_type {
            println!(
                "{:<24} {:>10} {:>12.2} {:>10}",
                edge_type,
                count,
                avg.unwrap_or(0.0),
                max.unwrap_or(0)
            );
        }
        println!("{:-<60}", "");
    }

    // Best-connected contacts by outgoing edges
    let top = graph
        .db()
        .with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT c.contact_id, c.name, COUNT(e.edge_id) AS degree
                FROM contacts c
                JOIN inferred_edges e ON e.from_contact_id = c.contact_id
                GROUP BY c.contact_id
                ORDER BY degree DESC, c.contact_id
                LIMIT 10
                "#,
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?));
            }
            Ok::<Vec<_>, ProfileGraphError>(results)
        })
        .await?;

    if !top.is_empty() {
        println!("\nMost Connected Contacts:\n");
        for (contact_id, name, degree) in &top {
            println!("  #{:<8} {:<32} {:>4} edges", contact_id, name, degree);
        }
    }

    println!();
    Ok(())
}
