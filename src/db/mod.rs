use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{Result, ProfileGraphError};

pub mod migrate;

/// Pragmas applied to every connection.
///
/// WAL lets graph reads run next to recompute writes; busy_timeout makes
/// concurrent writers for different contacts wait instead of failing.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA busy_timeout = 5000; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536;";

/// Database handle shared by every component.
///
/// Holds only the path; each operation opens its own connection.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    /// Create a new database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Create the handle and apply pending migrations
    pub async fn open_migrated<P: AsRef<Path>>(db_path: P, migrations_dir: &Path) -> Result<Self> {
        let db = Self::new(db_path);
        let migrations_dir = migrations_dir.to_path_buf();
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with the standard pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(conn)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            log::error!("Blocking database task failed: {}", e);
            ProfileGraphError::StorageUnavailable(rusqlite::Error::InvalidParameterCount(0, 0))
        })?
    }
}

/// Fresh migrated database in a temp dir, shared by the unit tests.
#[cfg(test)]
pub(crate) async fn test_db() -> (Db, tempfile::TempDir) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let db = Db::open_migrated(&db_path, &migrations_dir).await.unwrap();
    (db, temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_db_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);

        let result = db.with_connection(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER)", [])?;
            Ok(())
        }).await;

        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_pragmas_set() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);

        db.with_connection(|conn| {
            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
            assert_eq!(journal_mode.to_uppercase(), "WAL");

            let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
            assert_eq!(foreign_keys, 1);

            Ok::<(), ProfileGraphError>(())
        }).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_path_is_storage_error() {
        let db = Db::new("/nonexistent-dir/for/profilegraph/test.db");
        let err = db.with_connection(|_conn| Ok(())).await.unwrap_err();
        assert!(err.is_storage());
    }
}
