//! `ProfileGraph`: one handle over every component.
//!
//! Owns the storage handle and the per-key locks. Fact upserts are
//! serialized per Person subject and recomputes per contact; different keys
//! run independently. Reads take no locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::Config;
use crate::contacts::{self, AttributeUpdate, ContactStore, IdentityFields};
use crate::db::Db;
use crate::error::Result;
use crate::facts::{flatten_graph, replace_subjects, Fact, FactPattern, FactStore, FactWriter, WriteSummary};
use crate::graph::{BatchReport, EdgeInferenceEngine, GraphBuilder, GraphResult};
use crate::profile::ProfileRecord;
use crate::resolve::{EntityResolver, Resolution};
use crate::transform::{check_record, transform_profile, TransformOptions};

/// Idle lock entries are pruned once the map grows past this.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// Async mutex per key.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if locks.len() > LOCK_PRUNE_THRESHOLD {
                locks.retain(|_, l| Arc::strong_count(l) > 1);
            }
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Result of [`ProfileGraph::import_profile`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub resolution: Resolution,
    /// Person key the contact's facts live under
    pub entity_key: String,
    pub facts: WriteSummary,
}

/// Row counts across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub contacts: usize,
    pub actor_links: usize,
    pub facts: usize,
    pub subjects: usize,
    pub inferred_edges: usize,
    pub contributions: usize,
}

pub struct ProfileGraph {
    db: Db,
    config: Config,
    contacts: ContactStore,
    resolver: EntityResolver,
    facts: FactStore,
    writer: FactWriter,
    inference: EdgeInferenceEngine,
    graph: GraphBuilder,
    subject_locks: KeyedLocks,
    contact_locks: KeyedLocks,
}

impl ProfileGraph {
    pub fn new(db: Db, config: Config) -> Self {
        let facts = FactStore::new(db.clone());
        Self {
            contacts: ContactStore::new(db.clone()),
            resolver: EntityResolver::new(db.clone()),
            writer: FactWriter::new(facts.clone()),
            facts,
            inference: EdgeInferenceEngine::new(db.clone(), config.inference.clone()),
            graph: GraphBuilder::new(db.clone(), config.graph.clone()),
            subject_locks: KeyedLocks::default(),
            contact_locks: KeyedLocks::default(),
            db,
            config,
        }
    }

    /// Open the configured database, apply pending migrations and wire everything up.
    pub async fn open(config: Config) -> Result<Self> {
        let db = Db::open_migrated(config.db_path(), config.migrations_dir()).await?;
        log::info!("Profile graph opened at {}", config.db_path().display());
        Ok(Self::new(db, config))
    }

    /// Replace the default dedup rules.
    pub fn with_resolver(mut self, resolver: EntityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn contacts(&self) -> &ContactStore {
        &self.contacts
    }

    pub async fn resolve_entity(&self, actor_id: &str, identity: &IdentityFields) -> Result<Resolution> {
        self.resolver.resolve(actor_id, identity).await
    }

    /// Transform `record` and replace the facts of every entity it yields.
    pub async fn import_entity_graph(
        &self,
        record: &ProfileRecord,
        options: &TransformOptions,
    ) -> Result<WriteSummary> {
        let graph = transform_profile(record, options)?;
        let _guard = self.subject_locks.lock(&graph.primary.to_string()).await;
        self.writer.write(&graph).await
    }

    /// Resolve, then store attributes and the entity graph together.
    ///
    /// The attribute update, the fact replacement, the cleanup of a
    /// superseded Person key and the new key all commit in one transaction.
    /// A record the transformer rejects touches nothing; a contact created
    /// by resolution stays behind when the later write fails.
    pub async fn import_profile(
        &self,
        actor_id: &str,
        record: &ProfileRecord,
        options: &TransformOptions,
    ) -> Result<ImportOutcome> {
        check_record(record, options)?;
        let resolution = self
            .resolver
            .resolve(actor_id, &IdentityFields::from_record(record))
            .await?;
        let contact_id = resolution.contact_id;

        let graph = transform_profile(record, &options.clone().with_contact(contact_id))?;
        let entity_key = graph.primary.to_string();
        let groups = flatten_graph(&graph);
        let update = AttributeUpdate::from_record(record)?;

        let _contact_guard = self.contact_locks.lock(&contact_id.to_string()).await;
        let previous = self
            .contacts
            .get(contact_id)
            .await?
            .entity_key
            .filter(|k| *k != entity_key);

        let mut subjects: Vec<&str> = previous.iter().map(String::as_str).collect();
        subjects.push(&entity_key);
        subjects.sort_unstable();
        let mut subject_guards = Vec::with_capacity(subjects.len());
        for subject in subjects {
            subject_guards.push(self.subject_locks.lock(subject).await);
        }

        let summary_subjects = groups.len();
        let key = entity_key.clone();
        let old_key = previous.clone();
        let written = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                contacts::apply_attributes(&tx, contact_id, &update)?;
                if let Some(old_key) = &old_key {
                    contacts::delete_person_facts(&tx, old_key)?;
                }
                let written = replace_subjects(&tx, &groups)?;
                contacts::set_entity_key(&tx, contact_id, &key)?;
                tx.commit()?;
                Ok(written)
            })
            .await?;

        if let Some(old_key) = previous {
            log::info!("Contact {} moved from {} to {}", contact_id, old_key, entity_key);
        }
        log::info!(
            "Imported {} as contact {} ({} facts, {})",
            entity_key,
            contact_id,
            written,
            if resolution.is_new { "new" } else { "merged" }
        );
        Ok(ImportOutcome {
            resolution,
            entity_key,
            facts: WriteSummary {
                subjects: summary_subjects,
                facts: written,
            },
        })
    }

    /// Pattern query; an unavailable store yields no facts.
    pub async fn query_facts(&self, pattern: &FactPattern) -> Vec<Fact> {
        match self.facts.query_pattern(pattern).await {
            Ok(facts) => facts,
            Err(e) if e.is_storage() => {
                log::error!("Fact store unavailable, returning no facts: {}", e);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Fact query failed, returning no facts: {}", e);
                Vec::new()
            }
        }
    }

    /// Pattern query that reports storage failures.
    pub async fn query_facts_fresh(&self, pattern: &FactPattern) -> Result<Vec<Fact>> {
        self.facts.query_pattern(pattern).await
    }

    pub async fn recompute_edges(&self, contact_id: i64) -> Result<usize> {
        let _guard = self.contact_locks.lock(&contact_id.to_string()).await;
        self.inference.recompute_edges(contact_id).await
    }

    /// Recompute every contact; per-contact failures are counted, not raised.
    pub async fn recompute_all(&self) -> Result<BatchReport> {
        let ids = self.contacts.list_ids().await?;
        let mut report = BatchReport::default();

        for contact_id in ids {
            match self.recompute_edges(contact_id).await {
                Ok(n) => {
                    report.processed += 1;
                    report.edges_created += n;
                }
                Err(e) => {
                    report.failed += 1;
                    log::warn!("Edge recompute failed for contact {}: {}", contact_id, e);
                }
            }
        }

        log::info!(
            "Edge recompute complete: {} processed, {} failed, {} edges",
            report.processed,
            report.failed,
            report.edges_created
        );
        Ok(report)
    }

    /// Ego graph of `root_actor`; an unavailable store yields the bare root.
    pub async fn build_graph(&self, root_actor: &str, max_depth: usize, max_nodes_per_degree: usize) -> GraphResult {
        match self.graph.build_graph(root_actor, max_depth, max_nodes_per_degree).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Graph build failed for {}, returning root only: {}", root_actor, e);
                GraphResult::root_only(root_actor)
            }
        }
    }

    /// [`build_graph`](Self::build_graph) with the configured depth and width.
    pub async fn build_default_graph(&self, root_actor: &str) -> GraphResult {
        let graph = &self.config.graph;
        self.build_graph(root_actor, graph.max_depth, graph.max_nodes_per_degree)
            .await
    }

    /// Delete a contact, its facts, edges and links. Returns facts removed.
    pub async fn delete_contact(&self, contact_id: i64) -> Result<usize> {
        let _guard = self.contact_locks.lock(&contact_id.to_string()).await;
        let removed = self.contacts.delete(contact_id).await?;
        log::info!("Deleted contact {} ({} facts)", contact_id, removed);
        Ok(removed)
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        self.db
            .with_connection(|conn| {
                let count = |sql: &str| -> Result<usize> {
                    Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as usize)
                };
                Ok(StoreCounts {
                    contacts: count("SELECT COUNT(*) FROM contacts")?,
                    actor_links: count("SELECT COUNT(*) FROM actor_contacts")?,
                    facts: count("SELECT COUNT(*) FROM facts")?,
                    subjects: count("SELECT COUNT(DISTINCT subject) FROM facts")?,
                    inferred_edges: count("SELECT COUNT(*) FROM inferred_edges")?,
                    contributions: count("SELECT COUNT(*) FROM contributions")?,
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::facts::predicates;
    use crate::graph::{edges_from, EdgeType};
    use crate::profile::Experience;
    use crate::resolve::MatchRule;

    fn options() -> TransformOptions {
        TransformOptions::new("linkedin").with_actor("user-1")
    }

    fn profile(name: &str, slug: &str, company: &str) -> ProfileRecord {
        ProfileRecord {
            name: name.to_string(),
            profile_url: Some(format!("https://www.linkedin.com/in/{}/", slug)),
            follower_count: Some(10),
            experience: vec![Experience { company: company.to_string(), ..Default::default() }],
            ..Default::default()
        }
    }

    fn without_url(name: &str, company: &str) -> ProfileRecord {
        ProfileRecord {
            name: name.to_string(),
            experience: vec![Experience { company: company.to_string(), ..Default::default() }],
            ..Default::default()
        }
    }

    async fn works_for(pg: &ProfileGraph, person: &str) -> Vec<String> {
        pg.query_facts_fresh(&FactPattern::subject(person).with_predicate(predicates::WORKS_FOR))
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.object)
            .collect()
    }

    async fn setup() -> (ProfileGraph, tempfile::TempDir) {
        let (db, temp) = test_db().await;
        (ProfileGraph::new(db, Config::default()), temp)
    }

    #[tokio::test]
    async fn test_keyed_locks_serialize_same_key() {
        let locks = KeyedLocks::default();
        let guard = locks.lock("a").await;
        let other = tokio::time::timeout(std::time::Duration::from_millis(20), locks.lock("b")).await;
        assert!(other.is_ok());
        let same = tokio::time::timeout(std::time::Duration::from_millis(20), locks.lock("a")).await;
        assert!(same.is_err());
        drop(guard);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), locks.lock("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_import_profile_end_to_end() {
        let (pg, _temp) = setup().await;
        let outcome = pg.import_profile("user-1", &profile("Jane Doe", "jane-doe", "Acme"), &options()).await.unwrap();
        assert!(outcome.resolution.is_new);
        assert_eq!(outcome.entity_key, "person:linkedin:linkedin-com-in-jane-doe");

        let contact = pg.contacts().get(outcome.resolution.contact_id).await.unwrap();
        assert_eq!(contact.entity_key.as_deref(), Some("person:linkedin:linkedin-com-in-jane-doe"));

        let names = pg
            .query_facts(&FactPattern::subject(&outcome.entity_key).with_predicate(predicates::NAME))
            .await;
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].object, "Jane Doe");
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let (pg, _temp) = setup().await;
        let record = profile("Jane Doe", "jane-doe", "Acme");
        let first = pg.import_profile("user-1", &record, &options()).await.unwrap();
        let before = pg.query_facts_fresh(&FactPattern::default()).await.unwrap();

        let second = pg.import_profile("user-1", &record, &options()).await.unwrap();
        let after = pg.query_facts_fresh(&FactPattern::default()).await.unwrap();

        assert_eq!(second.resolution.contact_id, first.resolution.contact_id);
        assert_eq!(second.resolution.matched_by, Some(MatchRule::ProfileUrl));
        assert_eq!(first.facts, second.facts);
        let strip = |facts: Vec<Fact>| {
            let mut facts: Vec<Fact> = facts.into_iter().filter(|f| f.predicate != predicates::ENDED_AT).collect();
            facts.sort();
            facts
        };
        assert_eq!(strip(before), strip(after));
    }

    #[tokio::test]
    async fn test_recompute_and_graph() {
        let (pg, _temp) = setup().await;
        let ann = pg.import_profile("user-1", &profile("Ann", "ann", "Acme Inc."), &options()).await.unwrap();
        let bob = pg.import_profile("user-2", &profile("Bob", "bob", "acme"), &options()).await.unwrap();
        let (ann, bob) = (ann.resolution.contact_id, bob.resolution.contact_id);

        let report = pg.recompute_all().await.unwrap();
        assert_eq!(report, BatchReport { processed: 2, failed: 0, edges_created: 2 });
        let edges = edges_from(pg.db(), ann).await.unwrap();
        assert_eq!(edges[0].to_contact_id, bob);
        assert_eq!(edges[0].edge_type, EdgeType::SameEmployer);

        let graph = pg.build_graph("user-1", 2, 5).await;
        let ids: Vec<Option<i64>> = graph.nodes.iter().map(|n| n.contact_id).collect();
        assert_eq!(ids, vec![None, Some(ann), Some(bob)]);
        assert_eq!(graph.nodes[2].degree, 2);
    }

    #[tokio::test]
    async fn test_delete_contact_removes_facts_and_edges() {
        let (pg, _temp) = setup().await;
        let ann = pg.import_profile("user-1", &profile("Ann", "ann", "Acme"), &options()).await.unwrap();
        let bob = pg.import_profile("user-1", &profile("Bob", "bob", "Acme"), &options()).await.unwrap();
        pg.recompute_all().await.unwrap();

        let removed = pg.delete_contact(ann.resolution.contact_id).await.unwrap();
        assert!(removed > 0);
        assert!(pg.query_facts(&FactPattern::subject(&ann.entity_key)).await.is_empty());
        assert!(!pg.query_facts(&FactPattern::subject(&bob.entity_key)).await.is_empty());
        assert!(edges_from(pg.db(), bob.resolution.contact_id).await.unwrap().is_empty());

        let counts = pg.counts().await.unwrap();
        assert_eq!(counts.contacts, 1);
        assert_eq!(counts.inferred_edges, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_degrades_reads() {
        let temp = tempfile::TempDir::new().unwrap();
        // Unmigrated database: every table is missing
        let pg = ProfileGraph::new(Db::new(temp.path().join("empty.db")), Config::default());

        assert!(pg.query_facts(&FactPattern::subject("person:linkedin:jane")).await.is_empty());
        assert!(pg.query_facts_fresh(&FactPattern::subject("person:linkedin:jane")).await.is_err());

        let graph = pg.build_graph("user-1", 2, 5).await;
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_import_rejects_nameless_record() {
        let (pg, _temp) = setup().await;
        let err = pg.import_profile("user-1", &ProfileRecord::default(), &options()).await;
        assert!(err.is_err());
        assert_eq!(pg.counts().await.unwrap().contacts, 0);
    }

    #[tokio::test]
    async fn test_same_name_contacts_without_url_keep_separate_facts() {
        let (pg, _temp) = setup().await;
        let a = pg.import_profile("user-1", &without_url("John Smith", "Acme"), &options()).await.unwrap();
        let b = pg.import_profile("user-1", &without_url("John Smith", "Globex"), &options()).await.unwrap();
        assert!(b.resolution.is_new);
        assert_ne!(a.entity_key, b.entity_key);
        assert_eq!(a.entity_key, format!("person:linkedin:c-{}", a.resolution.contact_id));

        assert_eq!(works_for(&pg, &a.entity_key).await, vec!["org:linkedin:acme"]);
        assert_eq!(works_for(&pg, &b.entity_key).await, vec!["org:linkedin:globex"]);

        pg.delete_contact(b.resolution.contact_id).await.unwrap();
        assert_eq!(works_for(&pg, &a.entity_key).await, vec!["org:linkedin:acme"]);
    }

    #[tokio::test]
    async fn test_failed_fact_write_leaves_contact_unchanged() {
        let (pg, _temp) = setup().await;
        let first = pg.import_profile("user-1", &profile("Ann", "ann", "Acme"), &options()).await.unwrap();
        let contact_id = first.resolution.contact_id;
        let before = pg.contacts().get(contact_id).await.unwrap();

        pg.db()
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_facts BEFORE INSERT ON facts \
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = pg.import_profile("user-1", &profile("Ann", "ann", "Globex"), &options()).await.unwrap_err();
        assert!(err.is_storage());

        let after = pg.contacts().get(contact_id).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(works_for(&pg, &first.entity_key).await, vec!["org:linkedin:acme"]);
    }

    #[tokio::test]
    async fn test_reimport_with_url_moves_person_subject() {
        let (pg, _temp) = setup().await;
        let mut record = without_url("Ann", "Acme");
        record.email = Some("ann@example.com".to_string());
        let first = pg.import_profile("user-1", &record, &options()).await.unwrap();

        record.profile_url = Some("linkedin.com/in/ann".to_string());
        let second = pg.import_profile("user-1", &record, &options()).await.unwrap();

        assert_eq!(second.resolution.contact_id, first.resolution.contact_id);
        assert_eq!(second.entity_key, "person:linkedin:linkedin-com-in-ann");
        assert!(pg.query_facts_fresh(&FactPattern::subject(&first.entity_key)).await.unwrap().is_empty());
        let activities = pg
            .query_facts_fresh(&FactPattern::default().with_predicate(predicates::USED_SOURCE))
            .await
            .unwrap();
        assert_eq!(activities.len(), 1);
    }
}
