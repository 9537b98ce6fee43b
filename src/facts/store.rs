//! SQLite-backed fact store with per-subject replacement.

use std::collections::BTreeMap;

use rusqlite::{params, params_from_iter, Connection};

use super::{Fact, FactPattern};
use crate::db::Db;
use crate::error::{ProfileGraphError, Result};

/// Durable store of atomic facts.
#[derive(Debug, Clone)]
pub struct FactStore {
    db: Db,
}

impl FactStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Replace every fact of `subject` with `facts`.
    ///
    /// Runs in one transaction: readers see the old set until commit.
    pub async fn upsert_facts(&self, subject: &str, facts: Vec<Fact>) -> Result<usize> {
        let mut groups = BTreeMap::new();
        groups.insert(subject.to_string(), facts);
        self.upsert_batch(groups).await
    }

    /// Replace the fact sets of several subjects in a single transaction.
    ///
    /// Returns the number of facts stored. Nothing is written if any fact
    /// is misfiled under the wrong subject or any statement fails.
    pub async fn upsert_batch(&self, groups: BTreeMap<String, Vec<Fact>>) -> Result<usize> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let written = replace_subjects(&tx, &groups)?;
                tx.commit()?;
                Ok(written)
            })
            .await
    }

    /// All facts matching the non-`None` fields of `pattern`.
    pub async fn query_pattern(&self, pattern: &FactPattern) -> Result<Vec<Fact>> {
        let pattern = pattern.clone();
        self.db
            .with_connection(move |conn| query_pattern_with(conn, &pattern))
            .await
    }

    /// Remove every fact of `subject`; returns the number removed.
    pub async fn delete_subject(&self, subject: &str) -> Result<usize> {
        let subject = subject.to_string();
        self.db
            .with_connection(move |conn| {
                Ok(conn.execute("DELETE FROM facts WHERE subject = ?1", params![subject])?)
            })
            .await
    }

    pub async fn count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
                Ok(n as usize)
            })
            .await
    }
}

fn check_subjects(groups: &BTreeMap<String, Vec<Fact>>) -> Result<()> {
    for (subject, facts) in groups {
        if let Some(stray) = facts.iter().find(|f| &f.subject != subject) {
            return Err(ProfileGraphError::InvalidInput(format!(
                "Fact subject {} does not match upsert subject {}",
                stray.subject, subject
            )));
        }
    }
    Ok(())
}

/// Replace the fact sets of `groups` on an open connection.
///
/// The caller owns the transaction.
pub(crate) fn replace_subjects(conn: &Connection, groups: &BTreeMap<String, Vec<Fact>>) -> Result<usize> {
    check_subjects(groups)?;
    let mut written = 0;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO facts (subject, predicate, object, object_kind) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (subject, facts) in groups {
        conn.execute("DELETE FROM facts WHERE subject = ?1", params![subject])?;
        for fact in facts {
            written += stmt.execute(params![
                fact.subject,
                fact.predicate,
                fact.object,
                fact.object_kind.as_str(),
            ])?;
        }
    }
    Ok(written)
}

/// Pattern query on an open connection.
pub(crate) fn query_pattern_with(conn: &Connection, pattern: &FactPattern) -> Result<Vec<Fact>> {
    let mut clauses = Vec::new();
    let mut values: Vec<&str> = Vec::new();
    for (column, value) in [
        ("subject", &pattern.subject),
        ("predicate", &pattern.predicate),
        ("object", &pattern.object),
    ] {
        if let Some(v) = value {
            values.push(v.as_str());
            clauses.push(format!("{} = ?{}", column, values.len()));
        }
    }

    let mut sql = "SELECT subject, predicate, object, object_kind FROM facts".to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY fact_id");
    if let Some(limit) = pattern.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut facts = Vec::new();
    for row in rows {
        let (subject, predicate, object, kind) = row?;
        facts.push(Fact {
            subject,
            predicate,
            object,
            object_kind: kind.parse()?,
        });
    }
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::facts::ObjectKind;

    fn person_facts(subject: &str, name: &str) -> Vec<Fact> {
        vec![
            Fact::literal(subject, "rdf:type", "schema:Person"),
            Fact::literal(subject, "schema:name", name),
        ]
    }

    #[tokio::test]
    async fn test_upsert_replaces_subject_facts() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);

        store.upsert_facts("person:x:a", person_facts("person:x:a", "Old")).await.unwrap();
        store
            .upsert_facts("person:x:a", vec![Fact::literal("person:x:a", "schema:name", "New")])
            .await
            .unwrap();

        let facts = store.query_pattern(&FactPattern::subject("person:x:a")).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].object, "New");
    }

    #[tokio::test]
    async fn test_upsert_leaves_other_subjects_alone() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);

        store.upsert_facts("person:x:a", person_facts("person:x:a", "A")).await.unwrap();
        store.upsert_facts("person:x:b", person_facts("person:x:b", "B")).await.unwrap();
        store.upsert_facts("person:x:a", vec![]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let b = store.query_pattern(&FactPattern::subject("person:x:b")).await.unwrap();
        assert_eq!(b.len(), 2);
    }

    #[tokio::test]
    async fn test_misfiled_fact_rejected_without_writing() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);
        store.upsert_facts("person:x:a", person_facts("person:x:a", "A")).await.unwrap();

        let err = store
            .upsert_facts("person:x:a", person_facts("person:x:other", "B"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileGraphError::InvalidInput(_)));

        let facts = store.query_pattern(&FactPattern::subject("person:x:a")).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1].object, "A");
    }

    #[tokio::test]
    async fn test_query_pattern_wildcards() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);
        store.upsert_facts("person:x:a", person_facts("person:x:a", "Ann")).await.unwrap();
        store.upsert_facts("person:x:b", person_facts("person:x:b", "Bob")).await.unwrap();

        let all = store.query_pattern(&FactPattern::default()).await.unwrap();
        assert_eq!(all.len(), 4);

        let types = store
            .query_pattern(&FactPattern::default().with_predicate("rdf:type"))
            .await
            .unwrap();
        assert_eq!(types.len(), 2);
        assert!(types.iter().all(|f| f.object_kind == ObjectKind::Literal));

        let bob = store
            .query_pattern(&FactPattern::default().with_predicate("schema:name").with_object("Bob"))
            .await
            .unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].subject, "person:x:b");

        let limited = store.query_pattern(&FactPattern::default().with_limit(3)).await.unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_facts_collapse() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);
        let dup = Fact::literal("person:x:a", "schema:knowsAbout", "rust");
        let written = store.upsert_facts("person:x:a", vec![dup.clone(), dup]).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_subject() {
        let (db, _temp) = test_db().await;
        let store = FactStore::new(db);
        store.upsert_facts("person:x:a", person_facts("person:x:a", "A")).await.unwrap();

        assert_eq!(store.delete_subject("person:x:a").await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.delete_subject("person:x:a").await.unwrap(), 0);
    }
}
