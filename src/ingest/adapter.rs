//! Provider adapters: raw JSON payloads → [`ProfileRecord`].
//!
//! Each provider gets one [`ProfileAdapter`]; the [`AdapterRegistry`] picks
//! one by name. A payload file may hold a single profile object or an array
//! of them.

use serde_json::{Map, Value};

use crate::error::{ProfileGraphError, Result};
use crate::profile::{Education, Experience, ProfileRecord, Recommendation};

/// Maps one provider's payload shape to a [`ProfileRecord`].
pub trait ProfileAdapter: Send + Sync {
    /// Provider name used for lookup
    fn name(&self) -> &'static str;

    /// Convert a single profile object
    fn adapt(&self, payload: &Value) -> Result<ProfileRecord>;
}

/// Payloads already in [`ProfileRecord`] shape.
pub struct NormalizedAdapter;

impl ProfileAdapter for NormalizedAdapter {
    fn name(&self) -> &'static str {
        "normalized"
    }

    fn adapt(&self, payload: &Value) -> Result<ProfileRecord> {
        serde_json::from_value(payload.clone())
            .map_err(|e| ProfileGraphError::Adapter(format!("normalized payload: {}", e)))
    }
}

/// Scraper-style payloads with the usual field-name variations
/// (`full_name`/`firstName`, `experience`/`positions`, `people_also_viewed`).
pub struct GenericJsonAdapter;

impl ProfileAdapter for GenericJsonAdapter {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn adapt(&self, payload: &Value) -> Result<ProfileRecord> {
        let obj = payload
            .as_object()
            .ok_or_else(|| ProfileGraphError::Adapter("profile payload is not a JSON object".to_string()))?;

        let name = text(obj, &["full_name", "name"])
            .or_else(|| joined_name(obj))
            .ok_or_else(|| ProfileGraphError::Adapter("profile payload has no name".to_string()))?;

        Ok(ProfileRecord {
            name,
            headline: text(obj, &["headline", "occupation"]),
            location: location(obj),
            summary: text(obj, &["summary", "about"]),
            email: text(obj, &["email"]),
            profile_url: text(obj, &["profile_url", "linkedin_url", "url"])
                .or_else(|| text(obj, &["public_identifier"]).map(|id| format!("linkedin.com/in/{}", id))),
            experience: items(obj, &["experience", "positions"])
                .filter_map(experience)
                .collect(),
            education: items(obj, &["education", "educations"])
                .filter_map(education)
                .collect(),
            skills: items(obj, &["skills"])
                .filter_map(|s| match s {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Object(o) => text(o, &["name"]),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .collect(),
            follower_count: count(obj, &["follower_count", "followers"]),
            connection_count: count(obj, &["connection_count", "connections"]),
            also_viewed: items(obj, &["people_also_viewed", "also_viewed"])
                .filter_map(recommendation)
                .collect(),
        })
    }
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn joined_name(obj: &Map<String, Value>) -> Option<String> {
    let first = text(obj, &["first_name", "firstName"]);
    let last = text(obj, &["last_name", "lastName"]);
    match (first, last) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(n), None) | (None, Some(n)) => Some(n),
        (None, None) => None,
    }
}

fn location(obj: &Map<String, Value>) -> Option<String> {
    if let Some(loc) = text(obj, &["location"]) {
        return Some(loc);
    }
    let nested = obj.get("location")?.as_object()?;
    text(nested, &["default", "name"])
}

/// Array elements of the first key holding an array.
fn items<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> impl Iterator<Item = &'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .into_iter()
        .flatten()
}

fn count(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_end_matches('+').replace(',', "").parse().ok(),
        _ => None,
    })
}

/// "2021-03" from a string or a `{year, month}` object.
fn date(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(d) => {
            let year = d.get("year")?.as_i64()?;
            Some(match d.get("month").and_then(Value::as_i64) {
                Some(month) => format!("{:04}-{:02}", year, month),
                None => format!("{:04}", year),
            })
        }
        _ => None,
    })
}

/// Company name, either a string or an object with a `name`.
fn org_name(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    text(obj, keys).or_else(|| {
        keys.iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_object))
            .find_map(|o| text(o, &["name"]))
    })
}

fn experience(value: &Value) -> Option<Experience> {
    let obj = value.as_object()?;
    Some(Experience {
        company: org_name(obj, &["company", "companyName"]).unwrap_or_default(),
        title: text(obj, &["title", "position"]),
        start: date(obj, &["start", "starts_at", "startDate"]),
        end: date(obj, &["end", "ends_at", "endDate"]),
    })
}

fn education(value: &Value) -> Option<Education> {
    let obj = value.as_object()?;
    Some(Education {
        school: org_name(obj, &["school", "school_name"]).unwrap_or_default(),
        degree: text(obj, &["degree", "degree_name"]),
        field: text(obj, &["field", "field_of_study"]),
        start: date(obj, &["start", "starts_at", "startDate"]),
        end: date(obj, &["end", "ends_at", "endDate"]),
    })
}

fn recommendation(value: &Value) -> Option<Recommendation> {
    let obj = value.as_object()?;
    Some(Recommendation {
        name: text(obj, &["name", "full_name"])?,
        profile_url: text(obj, &["profile_url", "link"]),
        bio: text(obj, &["bio", "summary", "headline"]),
    })
}

/// Adapter registry that selects an adapter by provider name.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn ProfileAdapter>>,
}

impl AdapterRegistry {
    /// Registry with the built-in `normalized` and `generic` adapters
    pub fn new() -> Self {
        let mut registry = Self { adapters: Vec::new() };
        registry.register(Box::new(NormalizedAdapter));
        registry.register(Box::new(GenericJsonAdapter));
        registry
    }

    /// Register an adapter; a later adapter with the same name shadows earlier ones
    pub fn register(&mut self, adapter: Box<dyn ProfileAdapter>) {
        self.adapters.insert(0, adapter);
    }

    pub fn find(&self, provider: &str) -> Option<&dyn ProfileAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(provider))
            .map(|a| a.as_ref())
    }

    pub fn providers(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Parse a payload (one profile object or an array of them).
    ///
    /// Array elements that fail to adapt are logged and skipped; a payload
    /// yielding no record at all is an error.
    pub fn parse(&self, provider: &str, content: &str) -> Result<Vec<ProfileRecord>> {
        let adapter = self
            .find(provider)
            .ok_or_else(|| ProfileGraphError::Adapter(format!("No adapter for provider: {}", provider)))?;
        let payload: Value = serde_json::from_str(content)
            .map_err(|e| ProfileGraphError::Adapter(format!("JSON parse error: {}", e)))?;

        match payload {
            Value::Array(entries) => {
                let total = entries.len();
                let mut records = Vec::with_capacity(total);
                for (i, entry) in entries.iter().enumerate() {
                    match adapter.adapt(entry) {
                        Ok(record) => records.push(record),
                        Err(e) => log::warn!("Skipping payload entry {} ({}): {}", i, adapter.name(), e),
                    }
                }
                if records.is_empty() && total > 0 {
                    return Err(ProfileGraphError::Adapter(format!(
                        "None of {} payload entries could be adapted",
                        total
                    )));
                }
                Ok(records)
            }
            single => Ok(vec![adapter.adapt(&single)?]),
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
