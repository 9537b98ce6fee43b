use anyhow::Result;
use profilegraph::db::{migrate, Db};
use profilegraph::{Config, ProfileGraphError};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", &config.profilegraph.log_level)).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "migrate" => {
            let db = Db::open_migrated(config.db_path(), config.migrations_dir()).await?;
            log::info!("Migrations applied to {}", db.path().display());
        }
        "verify" => run_schema_verification(&config).await?,
        other => {
            anyhow::bail!("Unknown command: {} (expected `verify` or `migrate`)", other);
        }
    }

    Ok(())
}

/// Migrate, then check that the schema is complete
async fn run_schema_verification(config: &Config) -> Result<()> {
    log::info!("Starting profilegraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Migrations: {}", config.migrations_dir().display());

    let db = Db::open_migrated(config.db_path(), config.migrations_dir()).await?;
    log::info!("Database initialized successfully");

    verify_database_schema(&db).await?;
    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = [
            "actor_contacts",
            "contacts",
            "contributions",
            "facts",
            "inferred_edges",
            "schema_migrations",
        ];
        let mut all_tables_exist = true;
        for table in &expected_tables {
            if tables.iter().any(|t| t == table) {
                log::debug!("✓ Table exists: {}", table);
            } else {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            }
        }
        if !all_tables_exist {
            return Err(ProfileGraphError::Config("Not all required tables exist".to_string()));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < 3 {
            return Err(ProfileGraphError::Config(format!(
                "Expected at least 3 migrations, found {}",
                applied.len()
            )));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")?;
        let indexes: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        for index_name in ["idx_facts_subject", "idx_facts_predicate_object", "idx_edges_from_strength"] {
            if indexes.iter().any(|i| i == index_name) {
                log::debug!("✓ Index exists: {}", index_name);
            } else {
                log::warn!("Index not found: {}", index_name);
            }
        }

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            return Err(ProfileGraphError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(ProfileGraphError::Config("Foreign keys not enabled".to_string()));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(ProfileGraphError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    })
    .await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
