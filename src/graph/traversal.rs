//! Bounded BFS from a root actor over actor links and inferred edges.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;

use crate::config::{GraphConfig, RichnessFilter};
use crate::contacts::{contact_from_row, Contact, CONTACT_COLUMNS};
use crate::db::Db;
use crate::error::Result;

/// Edge type joining the root actor to its own contacts.
pub const DIRECT_CONTACT_EDGE: &str = "direct_contact";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// `root:<actor>` or `contact:<id>`
    pub id: String,
    pub contact_id: Option<i64>,
    pub label: String,
    pub degree: usize,
    pub headline: Option<String>,
    pub company: Option<String>,
    pub follower_count: Option<i64>,
}

impl GraphNode {
    fn root(actor_id: &str) -> Self {
        Self {
            id: format!("root:{}", actor_id),
            contact_id: None,
            label: actor_id.to_string(),
            degree: 0,
            headline: None,
            company: None,
            follower_count: None,
        }
    }

    fn contact(contact: Contact, degree: usize) -> Self {
        Self {
            id: contact_node_id(contact.contact_id),
            contact_id: Some(contact.contact_id),
            label: contact.name,
            degree,
            headline: contact.headline,
            company: contact.company,
            follower_count: contact.follower_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub strength: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes_per_degree: BTreeMap<usize, usize>,
    pub edges_per_type: BTreeMap<String, usize>,
    pub compute_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

impl GraphResult {
    /// A graph holding only the synthetic root node.
    pub fn root_only(actor_id: &str) -> Self {
        let mut result = Self {
            nodes: vec![GraphNode::root(actor_id)],
            edges: Vec::new(),
            stats: GraphStats::default(),
        };
        result.tally();
        result
    }

    fn tally(&mut self) {
        self.stats.nodes_per_degree.clear();
        self.stats.edges_per_type.clear();
        for node in &self.nodes {
            *self.stats.nodes_per_degree.entry(node.degree).or_default() += 1;
        }
        for edge in &self.edges {
            *self.stats.edges_per_type.entry(edge.edge_type.clone()).or_default() += 1;
        }
    }
}

fn contact_node_id(contact_id: i64) -> String {
    format!("contact:{}", contact_id)
}

/// Builds ego graphs for actors. Never writes.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    db: Db,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(db: Db, config: GraphConfig) -> Self {
        Self { db, config }
    }

    pub async fn build_graph(
        &self,
        root_actor: &str,
        max_depth: usize,
        max_nodes_per_degree: usize,
    ) -> Result<GraphResult> {
        let started = Instant::now();
        let actor_id = root_actor.to_string();
        let config = self.config.clone();

        let mut result = self
            .db
            .with_connection(move |conn| walk(conn, &actor_id, &config, max_depth, max_nodes_per_degree))
            .await?;

        result.stats.compute_time_ms = started.elapsed().as_millis() as u64;
        log::debug!(
            "Built graph for {}: {} nodes, {} edges in {}ms",
            root_actor,
            result.nodes.len(),
            result.edges.len(),
            result.stats.compute_time_ms
        );
        Ok(result)
    }
}

fn walk(
    conn: &Connection,
    actor_id: &str,
    config: &GraphConfig,
    max_depth: usize,
    cap: usize,
) -> Result<GraphResult> {
    let mut result = GraphResult::root_only(actor_id);
    if max_depth == 0 || cap == 0 {
        return Ok(result);
    }

    let root_id = result.nodes[0].id.clone();
    let direct = direct_contacts(conn, actor_id, &config.richness, cap)?;
    let mut seen: HashSet<i64> = direct.iter().map(|c| c.contact_id).collect();
    let mut frontier: Vec<i64> = direct.iter().map(|c| c.contact_id).collect();

    for contact in direct {
        result.edges.push(GraphEdge {
            source: root_id.clone(),
            target: contact_node_id(contact.contact_id),
            edge_type: DIRECT_CONTACT_EDGE.to_string(),
            strength: config.direct_contact_strength,
        });
        result.nodes.push(GraphNode::contact(contact, 1));
    }

    for degree in 2..=max_depth {
        if frontier.is_empty() {
            break;
        }

        let candidates = outgoing_edges(conn, &frontier)?;
        let mut accepted: Vec<i64> = Vec::new();
        for (_, to, _, _) in &candidates {
            if seen.contains(to) || accepted.contains(to) {
                continue;
            }
            if accepted.len() == cap {
                break;
            }
            accepted.push(*to);
        }

        for (from, to, edge_type, strength) in candidates {
            if accepted.contains(&to) {
                result.edges.push(GraphEdge {
                    source: contact_node_id(from),
                    target: contact_node_id(to),
                    edge_type,
                    strength,
                });
            }
        }
        for contact in load_contacts(conn, &accepted)? {
            result.nodes.push(GraphNode::contact(contact, degree));
        }

        seen.extend(accepted.iter().copied());
        frontier = accepted;
    }

    result.tally();
    Ok(result)
}

fn richness_clause(filter: &RichnessFilter) -> String {
    let mut criteria = Vec::new();
    if filter.profile_url {
        criteria.push("(c.profile_url IS NOT NULL AND c.profile_url <> '')");
    }
    if filter.recommendations {
        criteria.push("(c.also_viewed_json IS NOT NULL AND c.also_viewed_json NOT IN ('', '[]'))");
    }
    if filter.followers {
        criteria.push("c.follower_count IS NOT NULL");
    }
    if criteria.is_empty() {
        "1 = 1".to_string()
    } else {
        criteria.join(" OR ")
    }
}

fn direct_contacts(conn: &Connection, actor_id: &str, filter: &RichnessFilter, cap: usize) -> Result<Vec<Contact>> {
    let columns = CONTACT_COLUMNS
        .split(',')
        .map(|col| format!("c.{}", col.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM contacts c \
         JOIN actor_contacts ac ON ac.contact_id = c.contact_id \
         WHERE ac.actor_id = ?1 AND ({}) \
         ORDER BY c.follower_count IS NULL, c.follower_count DESC, c.contact_id \
         LIMIT ?2",
        columns,
        richness_clause(filter)
    );
    let mut stmt = conn.prepare(&sql)?;
    let contacts = stmt
        .query_map(params![actor_id, cap as i64], contact_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(contacts)
}

/// Edges leaving `from_ids`, strongest first.
fn outgoing_edges(conn: &Connection, from_ids: &[i64]) -> Result<Vec<(i64, i64, String, u32)>> {
    let placeholders = from_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT from_contact_id, to_contact_id, edge_type, strength FROM inferred_edges \
         WHERE from_contact_id IN ({}) \
         ORDER BY strength DESC, from_contact_id, to_contact_id, edge_type",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let edges = stmt
        .query_map(params_from_iter(from_ids.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?.max(0) as u32,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(edges)
}

/// Contacts for `ids`, in the order given.
fn load_contacts(conn: &Connection, ids: &[i64]) -> Result<Vec<Contact>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT {} FROM contacts WHERE contact_id IN ({})", CONTACT_COLUMNS, placeholders);
    let mut stmt = conn.prepare(&sql)?;
    let mut by_id: BTreeMap<i64, Contact> = stmt
        .query_map(params_from_iter(ids.iter()), contact_from_row)?
        .map(|row| row.map(|c| (c.contact_id, c)))
        .collect::<std::result::Result<_, rusqlite::Error>>()?;
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    async fn seed(db: &Db) {
        db.with_connection(|conn| {
            let contacts: [(i64, &str, Option<&str>, Option<i64>); 5] = [
                (1, "Ann", None, Some(100)),
                (2, "Bob", Some("https://linkedin.com/in/bob"), Some(50)),
                (3, "Cat", None, None),
                (4, "Dan", None, None),
                (5, "Eve", None, None),
            ];
            for (id, name, url, followers) in contacts {
                conn.execute(
                    "INSERT INTO contacts (contact_id, name, profile_url, follower_count, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, 'now', 'now')",
                    params![id, name, url, followers],
                )?;
            }
            for id in [1, 2, 5] {
                conn.execute(
                    "INSERT INTO actor_contacts (actor_id, contact_id, linked_at) VALUES ('user-1', ?1, 'now')",
                    params![id],
                )?;
            }
            for (from, to, edge_type, strength) in [
                (1, 3, "same_employer", 2),
                (1, 4, "shared_skills", 4),
                (2, 4, "same_school", 1),
                (4, 5, "same_employer", 2),
            ] {
                conn.execute(
                    "INSERT INTO inferred_edges (from_contact_id, to_contact_id, edge_type, strength, created_at) \
                     VALUES (?1, ?2, ?3, ?4, 'now')",
                    params![from, to, edge_type, strength],
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();
    }

    fn ids_at(result: &GraphResult, degree: usize) -> Vec<Option<i64>> {
        result
            .nodes
            .iter()
            .filter(|n| n.degree == degree)
            .map(|n| n.contact_id)
            .collect()
    }

    #[tokio::test]
    async fn test_caps_per_degree() {
        let (db, _temp) = test_db().await;
        seed(&db).await;
        let builder = GraphBuilder::new(db, GraphConfig::default());

        let result = builder.build_graph("user-1", 2, 1).await.unwrap();
        assert_eq!(result.nodes.len(), 3);
        assert_eq!(ids_at(&result, 0), vec![None]);
        // Highest follower count first; Eve fails the richness filter
        assert_eq!(ids_at(&result, 1), vec![Some(1)]);
        // Strongest outgoing edge wins the single slot
        assert_eq!(ids_at(&result, 2), vec![Some(4)]);

        assert_eq!(result.edges.len(), 2);
        assert_eq!(result.edges[0].edge_type, DIRECT_CONTACT_EDGE);
        assert_eq!(result.edges[0].strength, 5);
        assert_eq!(result.edges[1].source, "contact:1");
        assert_eq!(result.edges[1].target, "contact:4");
        assert_eq!(result.stats.nodes_per_degree.get(&2), Some(&1));
        assert_eq!(result.stats.edges_per_type.get("shared_skills"), Some(&1));
    }

    #[tokio::test]
    async fn test_keeps_every_edge_into_accepted_nodes() {
        let (db, _temp) = test_db().await;
        seed(&db).await;
        let builder = GraphBuilder::new(db, GraphConfig::default());

        let result = builder.build_graph("user-1", 3, 10).await.unwrap();
        assert_eq!(ids_at(&result, 1), vec![Some(1), Some(2)]);
        assert_eq!(ids_at(&result, 2), vec![Some(4), Some(3)]);
        assert_eq!(ids_at(&result, 3), vec![Some(5)]);

        let into_dan = result.edges.iter().filter(|e| e.target == "contact:4").count();
        assert_eq!(into_dan, 2);
        let nodes: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(nodes.len(), result.nodes.len());
    }

    #[tokio::test]
    async fn test_unknown_root_is_root_only() {
        let (db, _temp) = test_db().await;
        seed(&db).await;
        let builder = GraphBuilder::new(db, GraphConfig::default());

        let result = builder.build_graph("nobody", 3, 10).await.unwrap();
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "root:nobody");
        assert!(result.edges.is_empty());
        assert_eq!(result.stats.nodes_per_degree.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_richness_admits_bare_contacts() {
        let (db, _temp) = test_db().await;
        seed(&db).await;
        let config = GraphConfig {
            richness: RichnessFilter::disabled(),
            ..GraphConfig::default()
        };
        let builder = GraphBuilder::new(db, config);

        let result = builder.build_graph("user-1", 1, 10).await.unwrap();
        assert_eq!(ids_at(&result, 1), vec![Some(1), Some(2), Some(5)]);
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let (db, _temp) = test_db().await;
        seed(&db).await;
        let result = GraphBuilder::new(db, GraphConfig::default())
            .build_graph("user-1", 2, 5)
            .await
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["nodes"].is_array());
        assert!(json["stats"]["nodes_per_degree"].is_object());
    }
}
