//! Contact graph: inferred edges and bounded traversal.
//!
//! Edge inference derives weighted, typed edges between contacts from their
//! stored attributes; traversal walks explicit actor links plus those edges
//! outward from a root actor.

mod inference;
pub mod normalize;
mod traversal;

pub use inference::{extract_bio_company, BatchReport, EdgeInferenceEngine};
pub use traversal::{GraphBuilder, GraphEdge, GraphNode, GraphResult, GraphStats, DIRECT_CONTACT_EDGE};

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileGraphError, Result};

/// Signal that produced an inferred edge. Declaration order is scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    RecommendedTogether,
    SameEmployer,
    SameSchool,
    SharedSkills,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::RecommendedTogether,
        EdgeType::SameEmployer,
        EdgeType::SameSchool,
        EdgeType::SharedSkills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::RecommendedTogether => "recommended_together",
            EdgeType::SameEmployer => "same_employer",
            EdgeType::SameSchool => "same_school",
            EdgeType::SharedSkills => "shared_skills",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = ProfileGraphError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EdgeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProfileGraphError::InvalidInput(format!("Unknown edge type: {}", s)))
    }
}

/// A derived edge between two contacts (from --edge_type--> to).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredEdge {
    pub from_contact_id: i64,
    pub to_contact_id: i64,
    pub edge_type: EdgeType,
    /// Relative weight, never zero, not capped
    pub strength: u32,
    /// Matched values and confidence
    pub evidence: serde_json::Value,
}

/// Stored edges whose `from` side is `contact_id`, strongest first.
pub async fn edges_from(db: &crate::db::Db, contact_id: i64) -> Result<Vec<InferredEdge>> {
    db.with_connection(move |conn| edges_from_with(conn, contact_id)).await
}

pub(crate) fn edges_from_with(conn: &Connection, contact_id: i64) -> Result<Vec<InferredEdge>> {
    let mut stmt = conn.prepare(
        "SELECT from_contact_id, to_contact_id, edge_type, strength, evidence_json \
         FROM inferred_edges WHERE from_contact_id = ?1 \
         ORDER BY strength DESC, to_contact_id, edge_type",
    )?;
    let rows = stmt.query_map(params![contact_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut edges = Vec::new();
    for row in rows {
        let (from, to, edge_type, strength, evidence) = row?;
        edges.push(InferredEdge {
            from_contact_id: from,
            to_contact_id: to,
            edge_type: edge_type.parse()?,
            strength: strength.max(0) as u32,
            evidence: evidence
                .as_deref()
                .and_then(|e| serde_json::from_str(e).ok())
                .unwrap_or(serde_json::Value::Null),
        });
    }
    Ok(edges)
}
