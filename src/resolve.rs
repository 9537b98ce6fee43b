//! Entity resolution: does an incoming record refer to a known contact?
//!
//! Rules run in priority order and the first hit wins. The default set is
//! email, then canonical profile URL, then exact name + company. Callers can
//! supply their own [`DedupRule`]s; the first-match-wins contract stays.

use std::fmt;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::audit::{record_contribution, ContributionAction};
use crate::contacts::{insert_contact, link_actor, IdentityFields};
use crate::db::Db;
use crate::error::Result;

/// Which rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchRule {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "profileUrl")]
    ProfileUrl,
    #[serde(rename = "name+company")]
    NameCompany,
    /// Tag of a caller-supplied rule
    #[serde(untagged)]
    Custom(&'static str),
}

impl MatchRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchRule::Email => "email",
            MatchRule::ProfileUrl => "profileUrl",
            MatchRule::NameCompany => "name+company",
            MatchRule::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deduplication heuristic.
pub trait DedupRule: Send + Sync {
    fn tag(&self) -> MatchRule;

    /// Id of a matching contact, if any
    fn find(&self, conn: &Connection, fields: &IdentityFields) -> Result<Option<i64>>;
}

/// Exact (normalized) email match.
pub struct EmailRule;

impl DedupRule for EmailRule {
    fn tag(&self) -> MatchRule {
        MatchRule::Email
    }

    fn find(&self, conn: &Connection, fields: &IdentityFields) -> Result<Option<i64>> {
        let Some(email) = fields.normalized_email() else {
            return Ok(None);
        };
        Ok(conn
            .query_row(
                "SELECT contact_id FROM contacts WHERE email = ?1 ORDER BY contact_id LIMIT 1",
                params![email],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Exact canonical profile URL match.
pub struct ProfileUrlRule;

impl DedupRule for ProfileUrlRule {
    fn tag(&self) -> MatchRule {
        MatchRule::ProfileUrl
    }

    fn find(&self, conn: &Connection, fields: &IdentityFields) -> Result<Option<i64>> {
        let Some(url) = fields.canonical_profile_url() else {
            return Ok(None);
        };
        Ok(conn
            .query_row(
                "SELECT contact_id FROM contacts WHERE profile_url = ?1 ORDER BY contact_id LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Exact name + company match; only applies when both are present.
pub struct NameCompanyRule;

impl DedupRule for NameCompanyRule {
    fn tag(&self) -> MatchRule {
        MatchRule::NameCompany
    }

    fn find(&self, conn: &Connection, fields: &IdentityFields) -> Result<Option<i64>> {
        let name = fields.name.trim();
        let Some(company) = fields.trimmed_company() else {
            return Ok(None);
        };
        if name.is_empty() {
            return Ok(None);
        }
        Ok(conn
            .query_row(
                "SELECT contact_id FROM contacts \
                 WHERE name = ?1 COLLATE NOCASE AND company = ?2 COLLATE NOCASE \
                 ORDER BY contact_id LIMIT 1",
                params![name, company],
                |row| row.get(0),
            )
            .optional()?)
    }
}

/// Outcome of [`EntityResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub contact_id: i64,
    pub is_new: bool,
    pub matched_by: Option<MatchRule>,
}

/// Priority-ordered duplicate detection over the contact table.
#[derive(Clone)]
pub struct EntityResolver {
    db: Db,
    rules: Arc<Vec<Box<dyn DedupRule>>>,
}

impl EntityResolver {
    /// Resolver with the default email → profile URL → name+company rules
    pub fn new(db: Db) -> Self {
        Self::with_rules(
            db,
            vec![Box::new(EmailRule), Box::new(ProfileUrlRule), Box::new(NameCompanyRule)],
        )
    }

    /// Resolver with caller-supplied rules, checked in the given order
    pub fn with_rules(db: Db, rules: Vec<Box<dyn DedupRule>>) -> Self {
        Self {
            db,
            rules: Arc::new(rules),
        }
    }

    /// Read-only lookup: the first rule that matches, or `None`.
    pub async fn find_match(&self, fields: &IdentityFields) -> Result<Option<(i64, MatchRule)>> {
        let rules = Arc::clone(&self.rules);
        let fields = fields.clone();
        self.db
            .with_connection(move |conn| first_match(conn, &rules, &fields))
            .await
    }

    /// Match or create, link `actor_id` to the contact and audit the change.
    ///
    /// Runs in one transaction so the lookup and the write see the same rows.
    pub async fn resolve(&self, actor_id: &str, fields: &IdentityFields) -> Result<Resolution> {
        let rules = Arc::clone(&self.rules);
        let fields = fields.clone();
        let actor_id = actor_id.to_string();

        let resolution = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let resolution = match first_match(&tx, &rules, &fields)? {
                    Some((contact_id, rule)) => {
                        let newly_linked = link_actor(&tx, &actor_id, contact_id)?;
                        let action = if newly_linked {
                            ContributionAction::Linked
                        } else {
                            ContributionAction::AlreadyLinked
                        };
                        record_contribution(
                            &tx,
                            &actor_id,
                            contact_id,
                            action,
                            &json!({ "matched_by": rule.as_str() }),
                        )?;
                        Resolution {
                            contact_id,
                            is_new: false,
                            matched_by: Some(rule),
                        }
                    }
                    None => {
                        let contact_id = insert_contact(&tx, &fields)?;
                        link_actor(&tx, &actor_id, contact_id)?;
                        record_contribution(
                            &tx,
                            &actor_id,
                            contact_id,
                            ContributionAction::Created,
                            &json!({
                                "name": fields.name.trim(),
                                "email": fields.normalized_email(),
                                "profile_url": fields.canonical_profile_url(),
                                "company": fields.trimmed_company(),
                            }),
                        )?;
                        Resolution {
                            contact_id,
                            is_new: true,
                            matched_by: None,
                        }
                    }
                };
                tx.commit()?;
                Ok(resolution)
            })
            .await?;

        match resolution.matched_by {
            Some(rule) => log::debug!("Resolved contact {} by {}", resolution.contact_id, rule),
            None => log::debug!("Created contact {}", resolution.contact_id),
        }
        Ok(resolution)
    }
}

fn first_match(
    conn: &Connection,
    rules: &[Box<dyn DedupRule>],
    fields: &IdentityFields,
) -> Result<Option<(i64, MatchRule)>> {
    for rule in rules {
        if let Some(contact_id) = rule.find(conn, fields)? {
            return Ok(Some((contact_id, rule.tag())));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::list_contributions;
    use crate::contacts::ContactStore;
    use crate::db::test_db;

    fn identity(email: Option<&str>, url: Option<&str>, name: &str, company: Option<&str>) -> IdentityFields {
        IdentityFields {
            email: email.map(str::to_string),
            profile_url: url.map(str::to_string),
            name: name.to_string(),
            company: company.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_email_wins_over_profile_url() {
        let (db, _temp) = test_db().await;
        let contacts = ContactStore::new(db.clone());
        let by_url = contacts
            .create(&identity(None, Some("linkedin.com/in/jane"), "Jane", None))
            .await
            .unwrap();
        let by_email = contacts
            .create(&identity(Some("jane@example.com"), None, "Jane D", None))
            .await
            .unwrap();
        assert_ne!(by_url, by_email);

        let resolver = EntityResolver::new(db);
        let found = resolver
            .find_match(&identity(
                Some("JANE@example.com"),
                Some("https://www.linkedin.com/in/jane/"),
                "Jane",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(found, Some((by_email, MatchRule::Email)));
    }

    #[tokio::test]
    async fn test_profile_url_match() {
        let (db, _temp) = test_db().await;
        let id = ContactStore::new(db.clone())
            .create(&identity(None, Some("https://linkedin.com/in/jane?trk=x"), "Jane", None))
            .await
            .unwrap();
        let found = EntityResolver::new(db)
            .find_match(&identity(Some("other@example.com"), Some("www.linkedin.com/in/jane/"), "J", None))
            .await
            .unwrap();
        assert_eq!(found, Some((id, MatchRule::ProfileUrl)));
    }

    #[tokio::test]
    async fn test_name_company_requires_both_fields() {
        let (db, _temp) = test_db().await;
        let id = ContactStore::new(db.clone())
            .create(&identity(None, None, "Jane Doe", Some("Acme")))
            .await
            .unwrap();
        let resolver = EntityResolver::new(db);

        let found = resolver
            .find_match(&identity(None, None, "jane doe", Some(" ACME ")))
            .await
            .unwrap();
        assert_eq!(found, Some((id, MatchRule::NameCompany)));

        let no_company = resolver.find_match(&identity(None, None, "Jane Doe", None)).await.unwrap();
        assert_eq!(no_company, None);
        let blank_company = resolver
            .find_match(&identity(None, None, "Jane Doe", Some("  ")))
            .await
            .unwrap();
        assert_eq!(blank_company, None);
    }

    #[tokio::test]
    async fn test_resolve_creates_then_links() {
        let (db, _temp) = test_db().await;
        let resolver = EntityResolver::new(db.clone());
        let fields = identity(Some("jane@example.com"), None, "Jane", Some("Acme"));

        let first = resolver.resolve("user-1", &fields).await.unwrap();
        assert!(first.is_new);
        assert_eq!(first.matched_by, None);

        let second = resolver.resolve("user-2", &fields).await.unwrap();
        assert!(!second.is_new);
        assert_eq!(second.contact_id, first.contact_id);
        assert_eq!(second.matched_by, Some(MatchRule::Email));

        let third = resolver.resolve("user-2", &fields).await.unwrap();
        assert_eq!(third.contact_id, first.contact_id);

        let actions: Vec<String> = list_contributions(&db, first.contact_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.action)
            .collect();
        assert_eq!(actions, vec!["created", "linked", "already_linked"]);
    }

    struct NeverRule;

    impl DedupRule for NeverRule {
        fn tag(&self) -> MatchRule {
            MatchRule::Custom("never")
        }

        fn find(&self, _conn: &Connection, _fields: &IdentityFields) -> Result<Option<i64>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_custom_rules_replace_defaults() {
        let (db, _temp) = test_db().await;
        ContactStore::new(db.clone())
            .create(&identity(Some("jane@example.com"), None, "Jane", None))
            .await
            .unwrap();

        let resolver = EntityResolver::with_rules(db, vec![Box::new(NeverRule)]);
        let resolution = resolver
            .resolve("user-1", &identity(Some("jane@example.com"), None, "Jane", None))
            .await
            .unwrap();
        assert!(resolution.is_new);
        assert_eq!(MatchRule::Custom("never").to_string(), "never");
    }
}
