//! Profile record → entity graph. Pure: no storage or network access.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::{slugify, Entity, EntityGraph, EntityKey, EntityKind};
use crate::error::{ProfileGraphError, Result};
use crate::facts::predicates as p;
use crate::profile::{profile_path_id, ProfileRecord};

/// Per-import context for [`transform_profile`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    /// Source tag, e.g. `linkedin`
    pub source: String,
    /// Actor (user) the import runs on behalf of
    pub actor_id: Option<String>,
    /// Event the profile was collected at
    pub context_event_id: Option<String>,
    /// Resolved contact; keys URL-less persons
    pub contact_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl TransformOptions {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            actor_id: None,
            context_event_id: None,
            contact_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn with_event(mut self, event_id: &str) -> Self {
        self.context_event_id = Some(event_id.to_string());
        self
    }

    pub fn with_contact(mut self, contact_id: i64) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Key of the Person entity a record maps to.
///
/// Derived from the host and path of the canonical profile URL so reimports
/// target the same subject. Without a usable URL the resolved contact id is
/// used (`c-<id>`); outside a resolved import the fallback is a fingerprint
/// of source, name, email and current company.
pub fn person_key(record: &ProfileRecord, options: &TransformOptions) -> EntityKey {
    let source = options.source.as_str();
    let from_url = record
        .canonical_profile_url()
        .as_deref()
        .and_then(profile_path_id)
        .map(|s| slugify(&s))
        .filter(|s| !s.is_empty());

    let local_id = match (from_url, options.contact_id) {
        (Some(id), _) => id,
        (None, Some(contact_id)) => format!("c-{}", contact_id),
        (None, None) => {
            let mut hasher = Sha256::new();
            hasher.update(slugify(source).as_bytes());
            for part in [
                Some(record.name.as_str()),
                record.email.as_deref(),
                record.current_company(),
            ] {
                hasher.update(b"\0");
                hasher.update(part.unwrap_or("").trim().to_lowercase().as_bytes());
            }
            let digest = format!("{:x}", hasher.finalize());
            format!("h-{}", &digest[..16])
        }
    };
    EntityKey::new(EntityKind::Person, source, &local_id)
}

/// Reject records that cannot become a Person entity.
pub fn check_record(record: &ProfileRecord, options: &TransformOptions) -> Result<()> {
    if record.name.trim().is_empty() {
        return Err(ProfileGraphError::InvalidInput(
            "Profile record has no name".to_string(),
        ));
    }
    if slugify(&options.source).is_empty() {
        return Err(ProfileGraphError::InvalidInput(
            "Transform source tag is empty".to_string(),
        ));
    }
    Ok(())
}

/// Build the entity graph for one profile record.
///
/// Produces one Person, one Organization per distinct non-empty company,
/// one EducationalOrganization per distinct non-empty school and one
/// ProvenanceActivity.
pub fn transform_profile(record: &ProfileRecord, options: &TransformOptions) -> Result<EntityGraph> {
    check_record(record, options)?;
    let name = record.name.trim();

    let primary = person_key(record, options);
    let mut person = Entity::new(primary.clone());
    let mut satellites: Vec<Entity> = Vec::new();

    person.attr(p::NAME, Some(name));
    person.attr(p::HEADLINE, record.headline.as_deref());
    person.attr(p::LOCATION, record.location.as_deref());
    person.attr(p::SUMMARY, record.summary.as_deref());
    person.attr(p::URL, record.canonical_profile_url().as_deref());
    person.attr(p::FOLLOWER_COUNT, record.follower_count.map(|n| n.to_string()).as_deref());
    person.attr(p::CONNECTION_COUNT, record.connection_count.map(|n| n.to_string()).as_deref());

    for exp in &record.experience {
        let company = exp.company.trim();
        let org_id = slugify(company);
        if org_id.is_empty() {
            continue;
        }
        let key = EntityKey::new(EntityKind::Organization, &options.source, &org_id);
        if !satellites.iter().any(|e| e.key == key) {
            let mut org = Entity::new(key.clone());
            org.attr(p::NAME, Some(company));
            satellites.push(org);
        }
        if let Some(title) = exp.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            person.attr(p::OCCUPATION, Some(format!("{} @ {}", title, company).as_str()));
        }
        person.relate(p::WORKS_FOR, key);
    }

    for edu in &record.education {
        let school = edu.school.trim();
        let school_id = slugify(school);
        if school_id.is_empty() {
            continue;
        }
        let key = EntityKey::new(EntityKind::EducationalOrganization, &options.source, &school_id);
        if !satellites.iter().any(|e| e.key == key) {
            let mut org = Entity::new(key.clone());
            org.attr(p::NAME, Some(school));
            satellites.push(org);
        }
        let credential = [edu.degree.as_deref(), edu.field.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !credential.is_empty() {
            person.attr(p::CREDENTIAL, Some(format!("{} @ {}", credential, school).as_str()));
        }
        person.relate(p::ALUMNI_OF, key);
    }

    let mut seen_skills = Vec::new();
    for skill in &record.skills {
        let skill = skill.trim();
        let norm = skill.to_lowercase();
        if skill.is_empty() || seen_skills.contains(&norm) {
            continue;
        }
        seen_skills.push(norm);
        person.attr(p::KNOWS_ABOUT, Some(skill));
    }

    if let Some(event_id) = options
        .context_event_id
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
    {
        person.relate(
            p::ATTENDED_EVENT,
            EntityKey::new(EntityKind::Event, &options.source, &event_id),
        );
    }

    // Keyed off the person so a reimport replaces the previous activity.
    let prov_key = EntityKey::new(
        EntityKind::ProvenanceActivity,
        &options.source,
        &format!("import-{}", primary.local_id),
    );
    let mut activity = Entity::new(prov_key.clone());
    activity.attr(p::USED_SOURCE, Some(options.source.as_str()));
    activity.attr(p::ASSOCIATED_WITH, options.actor_id.as_deref());
    activity.attr(p::ENDED_AT, Some(options.timestamp.to_rfc3339().as_str()));
    activity.relate(p::GENERATED, primary.clone());
    person.relate(p::WAS_GENERATED_BY, prov_key);

    let mut entities = Vec::with_capacity(satellites.len() + 2);
    entities.push(person);
    entities.extend(satellites);
    entities.push(activity);

    Ok(EntityGraph { primary, entities })
}
