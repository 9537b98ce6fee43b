//! Contact records: the application-level rows Person entities attach to.
//!
//! Besides identity fields a contact keeps raw JSON attribute blobs
//! (experience, education, skills, "people also viewed") that only the edge
//! inference engine reads.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;

use crate::db::Db;
use crate::error::{ProfileGraphError, Result};
use crate::profile::{canonicalize_profile_url, Education, Experience, ProfileRecord, Recommendation};

/// Identity fields used to create and deduplicate contacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityFields {
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub name: String,
    pub company: Option<String>,
}

impl IdentityFields {
    pub fn from_record(record: &ProfileRecord) -> Self {
        Self {
            email: record.email.clone(),
            profile_url: record.profile_url.clone(),
            name: record.name.clone(),
            company: record.current_company().map(str::to_string),
        }
    }

    /// Lowercased, trimmed email; `None` when blank
    pub fn normalized_email(&self) -> Option<String> {
        normalize_email(self.email.as_deref())
    }

    pub fn canonical_profile_url(&self) -> Option<String> {
        self.profile_url.as_deref().and_then(canonicalize_profile_url)
    }

    pub fn trimmed_company(&self) -> Option<&str> {
        self.company.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

pub(crate) fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// A stored contact with its raw attribute blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub contact_id: i64,
    pub entity_key: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub company: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub experience_json: Option<String>,
    pub education_json: Option<String>,
    pub skills_json: Option<String>,
    pub also_viewed_json: Option<String>,
    pub follower_count: Option<i64>,
    pub connection_count: Option<i64>,
}

impl Contact {
    pub fn experience(&self) -> Result<Vec<Experience>> {
        self.parse_blob("experience_json", self.experience_json.as_deref())
    }

    pub fn education(&self) -> Result<Vec<Education>> {
        self.parse_blob("education_json", self.education_json.as_deref())
    }

    pub fn skills(&self) -> Result<Vec<String>> {
        self.parse_blob("skills_json", self.skills_json.as_deref())
    }

    pub fn also_viewed(&self) -> Result<Vec<Recommendation>> {
        self.parse_blob("also_viewed_json", self.also_viewed_json.as_deref())
    }

    fn parse_blob<T: DeserializeOwned>(&self, field: &'static str, blob: Option<&str>) -> Result<Vec<T>> {
        match blob.map(str::trim).filter(|b| !b.is_empty()) {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| ProfileGraphError::MalformedAttributeData {
                contact_id: self.contact_id,
                field,
                message: e.to_string(),
            }),
        }
    }
}

pub(crate) const CONTACT_COLUMNS: &str = "contact_id, entity_key, name, email, profile_url, company, \
     headline, location, experience_json, education_json, skills_json, also_viewed_json, \
     follower_count, connection_count";

pub(crate) fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        contact_id: row.get(0)?,
        entity_key: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        profile_url: row.get(4)?,
        company: row.get(5)?,
        headline: row.get(6)?,
        location: row.get(7)?,
        experience_json: row.get(8)?,
        education_json: row.get(9)?,
        skills_json: row.get(10)?,
        also_viewed_json: row.get(11)?,
        follower_count: row.get(12)?,
        connection_count: row.get(13)?,
    })
}

/// Insert a bare contact from identity fields; returns its id.
pub(crate) fn insert_contact(conn: &Connection, fields: &IdentityFields) -> Result<i64> {
    let name = fields.name.trim();
    if name.is_empty() {
        return Err(ProfileGraphError::InvalidInput("Contact name is empty".to_string()));
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO contacts (name, email, profile_url, company, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            name,
            fields.normalized_email(),
            fields.canonical_profile_url(),
            fields.trimmed_company(),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Link an actor to a contact; returns false if the link already existed.
pub(crate) fn link_actor(conn: &Connection, actor_id: &str, contact_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO actor_contacts (actor_id, contact_id, linked_at) VALUES (?1, ?2, ?3)",
        params![actor_id, contact_id, Utc::now().to_rfc3339()],
    )?;
    Ok(inserted > 0)
}

/// Attribute columns staged from a record before any write.
#[derive(Debug, Clone)]
pub(crate) struct AttributeUpdate {
    email: Option<String>,
    profile_url: Option<String>,
    company: Option<String>,
    headline: Option<String>,
    location: Option<String>,
    experience: String,
    education: String,
    skills: String,
    also_viewed: String,
    followers: Option<i64>,
    connections: Option<i64>,
}

impl AttributeUpdate {
    pub(crate) fn from_record(record: &ProfileRecord) -> Result<Self> {
        Ok(Self {
            email: normalize_email(record.email.as_deref()),
            profile_url: record.canonical_profile_url(),
            company: record.current_company().map(str::to_string),
            headline: record.headline.clone(),
            location: record.location.clone(),
            experience: to_json(&record.experience)?,
            education: to_json(&record.education)?,
            skills: to_json(&record.skills)?,
            also_viewed: to_json(&record.also_viewed)?,
            followers: record.follower_count,
            connections: record.connection_count,
        })
    }
}

pub(crate) fn apply_attributes(conn: &Connection, contact_id: i64, update: &AttributeUpdate) -> Result<()> {
    let updated = conn.execute(
        "UPDATE contacts SET \
            email = COALESCE(?2, email), \
            profile_url = COALESCE(?3, profile_url), \
            company = COALESCE(?4, company), \
            headline = COALESCE(?5, headline), \
            location = COALESCE(?6, location), \
            experience_json = ?7, \
            education_json = ?8, \
            skills_json = ?9, \
            also_viewed_json = ?10, \
            follower_count = COALESCE(?11, follower_count), \
            connection_count = COALESCE(?12, connection_count), \
            updated_at = ?13 \
         WHERE contact_id = ?1",
        params![
            contact_id,
            update.email,
            update.profile_url,
            update.company,
            update.headline,
            update.location,
            update.experience,
            update.education,
            update.skills,
            update.also_viewed,
            update.followers,
            update.connections,
            Utc::now().to_rfc3339(),
        ],
    )?;
    if updated == 0 {
        return Err(ProfileGraphError::ContactNotFound(contact_id));
    }
    Ok(())
}

pub(crate) fn set_entity_key(conn: &Connection, contact_id: i64, entity_key: &str) -> Result<()> {
    let updated = conn.execute(
        "UPDATE contacts SET entity_key = ?2 WHERE contact_id = ?1",
        params![contact_id, entity_key],
    )?;
    if updated == 0 {
        return Err(ProfileGraphError::ContactNotFound(contact_id));
    }
    Ok(())
}

/// Remove a Person subject and the provenance activities it was generated by.
pub(crate) fn delete_person_facts(conn: &Connection, person_key: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM facts WHERE subject = ?1 OR subject IN \
         (SELECT object FROM facts WHERE subject = ?1 \
          AND predicate = 'prov:wasGeneratedBy' AND object_kind = 'reference')",
        params![person_key],
    )?)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ProfileGraphError::InvalidInput(e.to_string()))
}

/// Contact table access.
#[derive(Debug, Clone)]
pub struct ContactStore {
    db: Db,
}

impl ContactStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, fields: &IdentityFields) -> Result<i64> {
        let fields = fields.clone();
        self.db.with_connection(move |conn| insert_contact(conn, &fields)).await
    }

    pub async fn get(&self, contact_id: i64) -> Result<Contact> {
        self.db
            .with_connection(move |conn| {
                let sql = format!("SELECT {} FROM contacts WHERE contact_id = ?1", CONTACT_COLUMNS);
                conn.query_row(&sql, params![contact_id], contact_from_row)
                    .optional()?
                    .ok_or(ProfileGraphError::ContactNotFound(contact_id))
            })
            .await
    }

    pub async fn list_ids(&self) -> Result<Vec<i64>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT contact_id FROM contacts ORDER BY contact_id")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(ids)
            })
            .await
    }

    pub async fn link_actor(&self, actor_id: &str, contact_id: i64) -> Result<bool> {
        let actor_id = actor_id.to_string();
        self.db
            .with_connection(move |conn| link_actor(conn, &actor_id, contact_id))
            .await
    }

    /// Store the enrichment attributes of `record` on the contact.
    ///
    /// Identity fields are only filled in, never blanked: a record without
    /// an email keeps the email already on file.
    pub async fn update_attributes(&self, contact_id: i64, record: &ProfileRecord) -> Result<()> {
        let update = AttributeUpdate::from_record(record)?;
        self.db
            .with_connection(move |conn| apply_attributes(conn, contact_id, &update))
            .await
    }

    pub async fn set_entity_key(&self, contact_id: i64, entity_key: &str) -> Result<()> {
        let entity_key = entity_key.to_string();
        self.db
            .with_connection(move |conn| set_entity_key(conn, contact_id, &entity_key))
            .await
    }

    /// Delete a contact together with its facts.
    ///
    /// Edges, actor links and contributions go with it through the foreign
    /// keys. Returns the number of facts removed.
    pub async fn delete(&self, contact_id: i64) -> Result<usize> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let entity_key: Option<String> = tx
                    .query_row(
                        "SELECT entity_key FROM contacts WHERE contact_id = ?1",
                        params![contact_id],
                        |row| row.get(0),
                    )
                    .optional()?
                    .ok_or(ProfileGraphError::ContactNotFound(contact_id))?;

                let removed = match entity_key {
                    Some(key) => delete_person_facts(&tx, &key)?,
                    None => 0,
                };
                tx.execute("DELETE FROM contacts WHERE contact_id = ?1", params![contact_id])?;
                tx.commit()?;
                Ok(removed)
            })
            .await
    }
}
