//! Atomic fact storage and the writer that flattens entity graphs into it.

mod store;
mod writer;

pub use store::FactStore;
pub(crate) use store::replace_subjects;
pub use writer::{flatten_graph, FactWriter, WriteSummary};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProfileGraphError;

/// Fixed predicate vocabulary.
pub mod predicates {
    pub const RDF_TYPE: &str = "rdf:type";

    pub const NAME: &str = "schema:name";
    pub const HEADLINE: &str = "schema:jobTitle";
    pub const LOCATION: &str = "schema:address";
    pub const SUMMARY: &str = "schema:description";
    pub const URL: &str = "schema:url";
    pub const OCCUPATION: &str = "schema:hasOccupation";
    pub const CREDENTIAL: &str = "schema:hasCredential";
    pub const FOLLOWER_COUNT: &str = "profile:followerCount";
    pub const CONNECTION_COUNT: &str = "profile:connectionCount";

    pub const WORKS_FOR: &str = "schema:worksFor";
    pub const ALUMNI_OF: &str = "schema:alumniOf";
    pub const KNOWS_ABOUT: &str = "schema:knowsAbout";
    pub const ATTENDED_EVENT: &str = "schema:attendedEvent";

    pub const WAS_GENERATED_BY: &str = "prov:wasGeneratedBy";
    pub const GENERATED: &str = "prov:generated";
    pub const USED_SOURCE: &str = "prov:used";
    pub const ASSOCIATED_WITH: &str = "prov:wasAssociatedWith";
    pub const ENDED_AT: &str = "prov:endedAtTime";
}

/// Whether a fact's object is a plain value or another entity's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Literal,
    Reference,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Literal => "literal",
            ObjectKind::Reference => "reference",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ProfileGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "literal" => Ok(ObjectKind::Literal),
            "reference" => Ok(ObjectKind::Reference),
            other => Err(ProfileGraphError::InvalidInput(format!("Unknown object kind: {}", other))),
        }
    }
}

/// Immutable (subject, predicate, object, object_kind) statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub object_kind: ObjectKind,
}

impl Fact {
    pub fn literal(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            object_kind: ObjectKind::Literal,
        }
    }

    pub fn reference(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            object_kind: ObjectKind::Reference,
        }
    }
}

/// Pattern for [`FactStore::query_pattern`]; `None` fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactPattern {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    /// Caller-imposed cap on returned rows
    pub limit: Option<usize>,
}

impl FactPattern {
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Default::default()
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
