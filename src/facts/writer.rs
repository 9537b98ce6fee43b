//! Flattens entity graphs into facts and persists them per subject.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{predicates, Fact, FactStore};
use crate::error::Result;
use crate::transform::EntityGraph;

/// What a successful write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WriteSummary {
    pub subjects: usize,
    pub facts: usize,
}

/// Flatten every entity of `graph` into facts grouped by subject key.
///
/// Type declarations become `rdf:type` literals, attributes become literal
/// facts and relations become reference facts pointing at the target key.
pub fn flatten_graph(graph: &EntityGraph) -> BTreeMap<String, Vec<Fact>> {
    let mut groups: BTreeMap<String, Vec<Fact>> = BTreeMap::new();
    for entity in &graph.entities {
        let subject = entity.key.to_string();
        let facts = groups.entry(subject.clone()).or_default();
        facts.push(Fact::literal(&subject, predicates::RDF_TYPE, entity.kind().type_uri()));
        for (predicate, value) in &entity.attributes {
            facts.push(Fact::literal(&subject, predicate, value));
        }
        for (predicate, target) in &entity.relations {
            facts.push(Fact::reference(&subject, predicate, &target.to_string()));
        }
    }
    groups
}

/// Persists transformer output into the [`FactStore`].
#[derive(Debug, Clone)]
pub struct FactWriter {
    store: FactStore,
}

impl FactWriter {
    pub fn new(store: FactStore) -> Self {
        Self { store }
    }

    /// Replace the stored facts of every subject in `graph`.
    ///
    /// The full fact list is staged before the single batch write, so a
    /// failure leaves every previous fact set untouched.
    pub async fn write(&self, graph: &EntityGraph) -> Result<WriteSummary> {
        let groups = flatten_graph(graph);
        let subjects = groups.len();
        let facts = self.store.upsert_batch(groups).await?;
        log::debug!(
            "Wrote {} facts across {} subjects for {}",
            facts,
            subjects,
            graph.primary
        );
        Ok(WriteSummary { subjects, facts })
    }
}
