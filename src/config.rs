use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profilegraph: ProfileGraphConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Storage and process settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileGraphConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ProfileGraphConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            migrations_dir: default_migrations_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Edge inference thresholds and strengths
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Strength of a recommendation matched by canonical profile URL
    #[serde(default = "default_url_match_strength")]
    pub url_match_strength: u32,
    /// Strength of a recommendation matched by name and bio company
    #[serde(default = "default_name_company_strength")]
    pub name_company_strength: u32,
    #[serde(default = "default_employer_strength")]
    pub employer_strength: u32,
    /// Minimum skills on the source contact and minimum overlap for `shared_skills`
    #[serde(default = "default_min_shared_skills")]
    pub min_shared_skills: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url_match_strength: default_url_match_strength(),
            name_company_strength: default_name_company_strength(),
            employer_strength: default_employer_strength(),
            min_shared_skills: default_min_shared_skills(),
        }
    }
}

/// Traversal limits and the degree-1 richness filter
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_nodes_per_degree")]
    pub max_nodes_per_degree: usize,
    #[serde(default = "default_direct_contact_strength")]
    pub direct_contact_strength: u32,
    #[serde(default)]
    pub richness: RichnessFilter,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes_per_degree: default_max_nodes_per_degree(),
            direct_contact_strength: default_direct_contact_strength(),
            richness: RichnessFilter::default(),
        }
    }
}

/// A degree-1 contact is graph-worthy when any enabled criterion holds.
/// With every criterion disabled, all linked contacts qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RichnessFilter {
    #[serde(default = "default_true")]
    pub profile_url: bool,
    #[serde(default = "default_true")]
    pub recommendations: bool,
    #[serde(default = "default_true")]
    pub followers: bool,
}

impl Default for RichnessFilter {
    fn default() -> Self {
        Self {
            profile_url: true,
            recommendations: true,
            followers: true,
        }
    }
}

impl RichnessFilter {
    /// Filter that lets every linked contact through
    pub fn disabled() -> Self {
        Self {
            profile_url: false,
            recommendations: false,
            followers: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        !(self.profile_url || self.recommendations || self.followers)
    }
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from("profilegraph.db")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_url_match_strength() -> u32 {
    3
}

fn default_name_company_strength() -> u32 {
    2
}

fn default_employer_strength() -> u32 {
    2
}

fn default_min_shared_skills() -> usize {
    3
}

fn default_max_depth() -> usize {
    2
}

fn default_max_nodes_per_degree() -> usize {
    25
}

fn default_direct_contact_strength() -> u32 {
    5
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in PROFILEGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("PROFILEGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::load_from(&config_path)
    }

    /// Load and validate a specific config file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.profilegraph.db_path.as_os_str().is_empty() {
            anyhow::bail!("profilegraph.db_path must not be empty");
        }

        if self.inference.url_match_strength == 0
            || self.inference.name_company_strength == 0
            || self.inference.employer_strength == 0
        {
            anyhow::bail!("inference strengths must be greater than 0");
        }

        if self.inference.min_shared_skills == 0 {
            anyhow::bail!("inference.min_shared_skills must be greater than 0");
        }

        if self.graph.max_nodes_per_degree == 0 {
            anyhow::bail!("graph.max_nodes_per_degree must be greater than 0");
        }

        if self.graph.direct_contact_strength == 0 {
            anyhow::bail!("graph.direct_contact_strength must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.profilegraph.db_path
    }

    /// Get the SQL migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.profilegraph.migrations_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[profilegraph]
db_path = "./test.db"
log_level = "debug"

[inference]
url_match_strength = 4
min_shared_skills = 2

[graph]
max_depth = 3
max_nodes_per_degree = 10

[graph.richness]
followers = false
"#;

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.profilegraph.log_level, "debug");
        assert_eq!(config.inference.url_match_strength, 4);
        assert_eq!(config.inference.name_company_strength, 2);
        assert_eq!(config.inference.min_shared_skills, 2);
        assert_eq!(config.graph.max_depth, 3);
        assert_eq!(config.graph.direct_contact_strength, 5);
        assert!(config.graph.richness.profile_url);
        assert!(!config.graph.richness.followers);
        assert_eq!(config.migrations_dir(), Path::new("migrations"));
    }

    #[test]
    fn test_config_empty_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.db_path(), Path::new("profilegraph.db"));
        assert_eq!(config.inference.min_shared_skills, 3);
        assert_eq!(config.graph.max_nodes_per_degree, 25);
        assert_eq!(config.graph.richness, RichnessFilter::default());
    }

    #[test]
    fn test_config_rejects_zero_width() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[graph]\nmax_nodes_per_degree = 0\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(err.to_string().contains("max_nodes_per_degree"));
    }

    #[test]
    fn test_config_env_override() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        let original = std::env::var("PROFILEGRAPH_CONFIG").ok();
        std::env::set_var("PROFILEGRAPH_CONFIG", config_path.to_str().unwrap());
        let config = Config::load();
        std::env::remove_var("PROFILEGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("PROFILEGRAPH_CONFIG", v);
        }
        assert_eq!(config.unwrap().graph.max_depth, 3);
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("PROFILEGRAPH_CONFIG").ok();
        std::env::set_var("PROFILEGRAPH_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("PROFILEGRAPH_CONFIG");
        if let Some(v) = original {
            std::env::set_var("PROFILEGRAPH_CONFIG", v);
        }
    }
}
