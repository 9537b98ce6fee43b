//! Edge inference: derive weighted, typed edges for one contact.
//!
//! Four signals are scanned in a fixed order (recommendation overlap, same
//! employer, same school, shared skills). The first signal to propose an
//! edge towards a given contact wins, so each recompute stores at most one
//! edge per ordered pair. Only the recomputed contact's outgoing edges are
//! touched, which makes A→B and B→A independent of each other.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use super::normalize::{normalize_company, normalize_person_name, normalize_school, normalize_skill};
use super::{EdgeType, InferredEdge};
use crate::config::InferenceConfig;
use crate::contacts::{contact_from_row, Contact, CONTACT_COLUMNS};
use crate::db::Db;
use crate::error::{ProfileGraphError, Result};
use crate::profile::canonicalize_profile_url;

/// Outcome of a batch recompute over every contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: usize,
    pub edges_created: usize,
}

/// Company guess from a bio snippet such as "Staff Engineer at Acme | ex-Globex".
pub fn extract_bio_company(bio: &str) -> Option<String> {
    static BIO_AT: OnceLock<Regex> = OnceLock::new();
    let re = BIO_AT.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+at\s+(.+)$").expect("Invalid regex pattern"));

    let caps = re.captures(bio.trim())?;
    let tail = caps.get(2)?.as_str();
    let company = tail
        .split(['|', '·', '•', ',', ';', '(', '\n'])
        .next()
        .unwrap_or(tail)
        .split(" - ")
        .next()
        .unwrap_or(tail)
        .trim();
    (!company.is_empty()).then(|| company.to_string())
}

/// Recomputes inferred edges from stored contact attributes.
#[derive(Debug, Clone)]
pub struct EdgeInferenceEngine {
    db: Db,
    config: InferenceConfig,
}

impl EdgeInferenceEngine {
    pub fn new(db: Db, config: InferenceConfig) -> Self {
        Self { db, config }
    }

    /// Replace every edge whose `from` side is `contact_id`.
    ///
    /// Returns the number of edges created. A failed insert is logged and
    /// reported as zero; the preceding delete is not rolled back.
    /// Concurrent calls for the same contact must be serialized by the caller.
    pub async fn recompute_edges(&self, contact_id: i64) -> Result<usize> {
        let (source, others) = self
            .db
            .with_connection(move |conn| {
                let source = load_contact(conn, contact_id)?;
                conn.execute(
                    "DELETE FROM inferred_edges WHERE from_contact_id = ?1",
                    params![contact_id],
                )?;
                let others = load_other_contacts(conn, contact_id)?;
                Ok((source, others))
            })
            .await?;

        let edges = stage_edges(&source, &others, &self.config);
        if edges.is_empty() {
            log::debug!("No edges inferred for contact {}", contact_id);
            return Ok(0);
        }

        let staged = edges.len();
        let inserted = self
            .db
            .with_connection(move |conn| insert_edges(conn, &edges))
            .await;

        match inserted {
            Ok(n) => {
                log::debug!("Inferred {} edges for contact {}", n, contact_id);
                Ok(n)
            }
            Err(e) => {
                log::error!(
                    "Failed to insert {} inferred edges for contact {}: {}",
                    staged,
                    contact_id,
                    e
                );
                Ok(0)
            }
        }
    }
}

fn load_contact(conn: &Connection, contact_id: i64) -> Result<Contact> {
    let sql = format!("SELECT {} FROM contacts WHERE contact_id = ?1", CONTACT_COLUMNS);
    conn.query_row(&sql, params![contact_id], contact_from_row)
        .optional()?
        .ok_or(ProfileGraphError::ContactNotFound(contact_id))
}

fn load_other_contacts(conn: &Connection, contact_id: i64) -> Result<Vec<Contact>> {
    let sql = format!(
        "SELECT {} FROM contacts WHERE contact_id <> ?1 ORDER BY contact_id",
        CONTACT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let contacts = stmt
        .query_map(params![contact_id], contact_from_row)?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(contacts)
}

fn insert_edges(conn: &mut Connection, edges: &[InferredEdge]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO inferred_edges \
             (from_contact_id, to_contact_id, edge_type, strength, evidence_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for edge in edges {
            stmt.execute(params![
                edge.from_contact_id,
                edge.to_contact_id,
                edge.edge_type.as_str(),
                edge.strength as i64,
                edge.evidence.to_string(),
                now,
            ])?;
        }
    }
    tx.commit()?;
    Ok(edges.len())
}

/// Unwrap an attribute blob, logging and skipping it when malformed.
fn parsed<T>(result: Result<Vec<T>>, signal: EdgeType) -> Option<Vec<T>> {
    match result {
        Ok(values) => Some(values),
        Err(e) => {
            log::warn!("Skipping {} signal: {}", signal, e);
            None
        }
    }
}

/// First-proposal-wins edge collection for one source contact.
struct Staging {
    from: i64,
    edges: Vec<InferredEdge>,
    targets: HashSet<i64>,
}

impl Staging {
    fn new(from: i64) -> Self {
        Self {
            from,
            edges: Vec::new(),
            targets: HashSet::new(),
        }
    }

    fn propose(&mut self, to: i64, edge_type: EdgeType, strength: u32, evidence: serde_json::Value) {
        if to == self.from || strength == 0 || !self.targets.insert(to) {
            return;
        }
        self.edges.push(InferredEdge {
            from_contact_id: self.from,
            to_contact_id: to,
            edge_type,
            strength,
            evidence,
        });
    }
}

/// Stage candidate edges from `source` to `others`. Pure.
pub(crate) fn stage_edges(source: &Contact, others: &[Contact], config: &InferenceConfig) -> Vec<InferredEdge> {
    let others: Vec<&Contact> = others
        .iter()
        .filter(|c| c.contact_id != source.contact_id)
        .collect();
    let mut staging = Staging::new(source.contact_id);

    recommendation_signal(source, &others, config, &mut staging);
    employer_signal(source, &others, config, &mut staging);
    school_signal(source, &others, &mut staging);
    skills_signal(source, &others, config, &mut staging);

    staging.edges
}

fn recommendation_signal(source: &Contact, others: &[&Contact], config: &InferenceConfig, staging: &mut Staging) {
    let signal = EdgeType::RecommendedTogether;
    let Some(viewed) = parsed(source.also_viewed(), signal) else {
        return;
    };
    if viewed.is_empty() {
        return;
    }

    let mut by_url: HashMap<String, i64> = HashMap::new();
    let mut by_name_company: HashMap<(String, String), i64> = HashMap::new();
    for other in others {
        if let Some(url) = other.profile_url.as_deref().and_then(canonicalize_profile_url) {
            by_url.entry(url).or_insert(other.contact_id);
        }
        let name = normalize_person_name(&other.name);
        let company = other.company.as_deref().map(normalize_company).unwrap_or_default();
        if !name.is_empty() && !company.is_empty() {
            by_name_company.entry((name, company)).or_insert(other.contact_id);
        }
    }

    for entry in viewed {
        if let Some(url) = entry.profile_url.as_deref().and_then(canonicalize_profile_url) {
            if let Some(&to) = by_url.get(&url) {
                staging.propose(
                    to,
                    signal,
                    config.url_match_strength,
                    json!({ "match": "profile_url", "confidence": "high", "profile_url": url }),
                );
            }
            continue;
        }

        let Some(company) = entry.bio.as_deref().and_then(extract_bio_company) else {
            continue;
        };
        let key = (normalize_person_name(&entry.name), normalize_company(&company));
        if key.0.is_empty() || key.1.is_empty() {
            continue;
        }
        if let Some(&to) = by_name_company.get(&key) {
            staging.propose(
                to,
                signal,
                config.name_company_strength,
                json!({
                    "match": "name_company",
                    "confidence": "medium",
                    "name": entry.name.trim(),
                    "company": company,
                }),
            );
        }
    }
}

/// Normalized employers of a contact: every experience entry plus the company column.
fn employers(contact: &Contact) -> Option<BTreeSet<String>> {
    let experience = parsed(contact.experience(), EdgeType::SameEmployer)?;
    Some(
        experience
            .iter()
            .map(|e| e.company.as_str())
            .chain(contact.company.as_deref())
            .map(normalize_company)
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

fn employer_signal(source: &Contact, others: &[&Contact], config: &InferenceConfig, staging: &mut Staging) {
    let Some(mine) = employers(source) else {
        return;
    };
    if mine.is_empty() {
        return;
    }
    for other in others {
        let Some(theirs) = employers(other) else {
            continue;
        };
        let shared: Vec<&String> = mine.intersection(&theirs).collect();
        if !shared.is_empty() {
            staging.propose(
                other.contact_id,
                EdgeType::SameEmployer,
                config.employer_strength,
                json!({ "companies": shared }),
            );
        }
    }
}

fn schools(contact: &Contact) -> Option<BTreeSet<String>> {
    let education = parsed(contact.education(), EdgeType::SameSchool)?;
    Some(
        education
            .iter()
            .map(|e| normalize_school(&e.school))
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn school_signal(source: &Contact, others: &[&Contact], staging: &mut Staging) {
    let Some(mine) = schools(source) else {
        return;
    };
    if mine.is_empty() {
        return;
    }
    for other in others {
        let Some(theirs) = schools(other) else {
            continue;
        };
        let shared: Vec<&String> = mine.intersection(&theirs).collect();
        if !shared.is_empty() {
            staging.propose(
                other.contact_id,
                EdgeType::SameSchool,
                shared.len() as u32,
                json!({ "schools": shared }),
            );
        }
    }
}

fn skill_set(contact: &Contact) -> Option<BTreeSet<String>> {
    let skills = parsed(contact.skills(), EdgeType::SharedSkills)?;
    Some(
        skills
            .iter()
            .map(|s| normalize_skill(s))
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn skills_signal(source: &Contact, others: &[&Contact], config: &InferenceConfig, staging: &mut Staging) {
    let Some(mine) = skill_set(source) else {
        return;
    };
    if mine.len() < config.min_shared_skills {
        return;
    }
    for other in others {
        let Some(theirs) = skill_set(other) else {
            continue;
        };
        let shared: Vec<&String> = mine.intersection(&theirs).collect();
        if shared.len() >= config.min_shared_skills {
            staging.propose(
                other.contact_id,
                EdgeType::SharedSkills,
                shared.len() as u32,
                json!({ "skills": shared }),
            );
        }
    }
}
