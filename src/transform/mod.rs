//! Semantic transformation: profile record → typed entity/relation graph.
//!
//! Entities are identified by [`EntityKey`], a typed key rendered as
//! `kind:source:local_id` so keys of different kinds never collide.

mod semantic;

pub use semantic::{check_record, transform_profile, TransformOptions};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProfileGraphError;

/// Kind tag carried by every [`EntityKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Organization,
    EducationalOrganization,
    ProvenanceActivity,
    /// Only ever the target of `attendedEvent`; never emitted as an entity.
    Event,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Organization => "org",
            EntityKind::EducationalOrganization => "edu",
            EntityKind::ProvenanceActivity => "prov",
            EntityKind::Event => "event",
        }
    }

    /// Value of the `rdf:type` fact for entities of this kind
    pub fn type_uri(&self) -> &'static str {
        match self {
            EntityKind::Person => "schema:Person",
            EntityKind::Organization => "schema:Organization",
            EntityKind::EducationalOrganization => "schema:EducationalOrganization",
            EntityKind::ProvenanceActivity => "prov:Activity",
            EntityKind::Event => "schema:Event",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ProfileGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(EntityKind::Person),
            "org" => Ok(EntityKind::Organization),
            "edu" => Ok(EntityKind::EducationalOrganization),
            "prov" => Ok(EntityKind::ProvenanceActivity),
            "event" => Ok(EntityKind::Event),
            other => Err(ProfileGraphError::InvalidInput(format!("Unknown entity kind: {}", other))),
        }
    }
}

/// Stable entity identity derived from source + source-local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub source: String,
    pub local_id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, source: &str, local_id: &str) -> Self {
        Self {
            kind,
            source: slugify(source),
            local_id: local_id.to_string(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.source, self.local_id)
    }
}

impl FromStr for EntityKey {
    type Err = ProfileGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(source), Some(local_id)) if !source.is_empty() && !local_id.is_empty() => {
                Ok(EntityKey {
                    kind: kind.parse()?,
                    source: source.to_string(),
                    local_id: local_id.to_string(),
                })
            }
            _ => Err(ProfileGraphError::InvalidInput(format!("Malformed entity key: {}", s))),
        }
    }
}

/// One entity with its literal attributes and outgoing relations.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: EntityKey,
    /// `(predicate, literal value)` in insertion order
    pub attributes: Vec<(&'static str, String)>,
    /// `(predicate, related entity)` in insertion order
    pub relations: Vec<(&'static str, EntityKey)>,
}

impl Entity {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.key.kind
    }

    /// Add a literal attribute; blank values are dropped
    pub fn attr(&mut self, predicate: &'static str, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.attributes.push((predicate, v.to_string()));
        }
    }

    pub fn relate(&mut self, predicate: &'static str, target: EntityKey) {
        if !self.relations.iter().any(|(p, t)| *p == predicate && *t == target) {
            self.relations.push((predicate, target));
        }
    }
}

/// Output of the transformer: one primary Person plus its satellites.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGraph {
    pub primary: EntityKey,
    pub entities: Vec<Entity>,
}

impl EntityGraph {
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind() == kind)
    }

    pub fn primary_entity(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.key == self.primary)
    }
}

/// Lowercase, collapse every run of non-alphanumerics into a single `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_key_round_trips_through_display() {
        let key = EntityKey::new(EntityKind::Organization, "LinkedIn", "acme-corp");
        assert_eq!(key.to_string(), "org:linkedin:acme-corp");
        let parsed: EntityKey = "org:linkedin:acme-corp".parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_entity_key_kinds_do_not_collide() {
        let person = EntityKey::new(EntityKind::Person, "linkedin", "acme");
        let org = EntityKey::new(EntityKind::Organization, "linkedin", "acme");
        assert_ne!(person.to_string(), org.to_string());
    }

    #[test]
    fn test_entity_key_rejects_malformed() {
        assert!("person:linkedin".parse::<EntityKey>().is_err());
        assert!("user:linkedin:3".parse::<EntityKey>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Acme, Inc. "), "acme-inc");
        assert_eq!(slugify("MIT"), "mit");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn test_entity_attr_drops_blank() {
        let mut e = Entity::new(EntityKey::new(EntityKind::Person, "x", "y"));
        e.attr("schema:name", Some("  "));
        e.attr("schema:name", None);
        e.attr("schema:name", Some(" Jane "));
        assert_eq!(e.attributes, vec![("schema:name", "Jane".to_string())]);
    }
}
