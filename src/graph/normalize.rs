//! Name normalization for similarity matching.

/// Trailing legal-form tokens dropped from company names.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc",
    "incorporated",
    "llc",
    "llp",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "limited",
    "plc",
    "gmbh",
    "ag",
    "sa",
];

/// Generic words dropped anywhere in school names.
const SCHOOL_STOPWORDS: &[&str] = &["university", "college", "school", "institute", "of", "the"];

/// Lowercase, replace punctuation with spaces, split on whitespace.
fn tokens(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// "Acme, Inc." → "acme". Empty string when nothing is left.
pub fn normalize_company(name: &str) -> String {
    let mut parts = tokens(name);
    // Keep at least one token so "The Company" style names survive.
    while parts.len() > 1 && parts.last().is_some_and(|t| LEGAL_SUFFIXES.contains(&t.as_str())) {
        parts.pop();
    }
    if parts.len() == 1 && LEGAL_SUFFIXES.contains(&parts[0].as_str()) {
        return String::new();
    }
    parts.join(" ")
}

/// "The University of Oxford" → "oxford". Empty string when nothing is left.
pub fn normalize_school(name: &str) -> String {
    tokens(name)
        .into_iter()
        .filter(|t| !SCHOOL_STOPWORDS.contains(&t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase and collapse whitespace.
pub fn normalize_person_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_skill(skill: &str) -> String {
    skill.trim().to_lowercase()
}
