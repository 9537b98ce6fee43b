//! Normalized profile record consumed by the core.
//!
//! Provider payloads are mapped into [`ProfileRecord`] by `ingest::adapter`;
//! nothing past this point sees provider-specific field names.

use serde::{Deserialize, Serialize};
use url::Url;

/// One normalized professional profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub follower_count: Option<i64>,
    #[serde(default)]
    pub connection_count: Option<i64>,
    /// "People also viewed" suggestions
    #[serde(default)]
    pub also_viewed: Vec<Recommendation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// A "people also viewed" entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    /// Free-text snippet, e.g. "Staff Engineer at Acme"
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileRecord {
    /// Company of the most recent experience entry with a non-empty name
    pub fn current_company(&self) -> Option<&str> {
        self.experience
            .iter()
            .map(|e| e.company.trim())
            .find(|c| !c.is_empty())
    }

    pub fn canonical_profile_url(&self) -> Option<String> {
        self.profile_url.as_deref().and_then(canonicalize_profile_url)
    }
}

/// Canonical form of a profile URL used for identity and matching.
///
/// Scheme forced to https, host lowercased without `www.`, query and
/// fragment dropped, trailing slash removed, path lowercased. Bare
/// `host/path` strings without a scheme are accepted.
pub fn canonicalize_profile_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = parsed.path().trim_end_matches('/').to_lowercase();
    Some(format!("https://{}{}", host, path))
}

/// Host plus path of a canonical profile URL (`https://linkedin.com/in/jane-doe`
/// → `linkedin.com/in/jane-doe`); `None` for a bare host.
pub fn profile_path_id(canonical_url: &str) -> Option<String> {
    let parsed = Url::parse(canonical_url).ok()?;
    let host = parsed.host_str()?;
    let path = parsed.path().trim_matches('/');
    if path.is_empty() {
        return None;
    }
    Some(format!("{}/{}", host, path))
}
