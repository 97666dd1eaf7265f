//! Connection pools and schema migrations.
//!
//! The backend pool is read-write with foreign keys enforced. Source pools
//! open the legacy replicas read-only so a migration can never write back.

use log::{error, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use diesel::connection::{Connection, SimpleConnection};
use diesel::r2d2;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::errors::{IntoCore, StorageError};
use fundsync_core::errors::{DatabaseError, Error, Result};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Strips an optional `sqlite://` scheme from a connection string.
pub fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://").unwrap_or(url)
}

/// Makes sure the backend database file exists and is in WAL mode.
pub fn init(db_path: &str) -> Result<String> {
    let db_path = database_path(db_path).to_string();

    if let Some(db_dir) = Path::new(&db_path).parent() {
        if !db_dir.as_os_str().is_empty() && !db_dir.exists() {
            fs::create_dir_all(db_dir).map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    db_dir.display(),
                    e
                )))
            })?;
        }
    }

    {
        let mut conn = SqliteConnection::establish(&db_path).into_core()?;
        conn.batch_execute(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous  = NORMAL;
        ",
        )
        .into_core()?;
    }

    Ok(db_path)
}

/// Read-write pool for the backend database.
pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    build_pool(db_path, 4, ConnectionCustomizer { read_only: false })
}

/// Read-only pool for a legacy source database.
pub fn create_source_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let db_path = database_path(db_path);
    if !Path::new(db_path).exists() {
        return Err(Error::Database(DatabaseError::ConnectionFailed(format!(
            "source database {} does not exist",
            db_path
        ))));
    }
    build_pool(db_path, 2, ConnectionCustomizer { read_only: true })
}

fn build_pool(
    db_path: &str,
    max_size: u32,
    customizer: ConnectionCustomizer,
) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_path(db_path));
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(customizer))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");
    let mut connection = get_connection(pool)?;

    let result = connection.run_pending_migrations(MIGRATIONS).map_err(|e| {
        error!("Database migration failed: {}", e);
        Error::from(StorageError::MigrationFailed(e.to_string()))
    })?;

    if result.is_empty() {
        info!("No pending migrations to apply.");
    } else {
        info!("Applied the following migrations:");
        for migration_version in &result {
            info!("  - {}", migration_version);
        }
    }

    Ok(())
}

pub fn get_connection(pool: &Pool<ConnectionManager<SqliteConnection>>) -> Result<DbConnection> {
    pool.get().into_core()
}

#[derive(Debug)]
struct ConnectionCustomizer {
    read_only: bool,
}

impl r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<(), diesel::r2d2::Error> {
        let pragmas = if self.read_only {
            "
            PRAGMA query_only = ON;
            PRAGMA busy_timeout = 30000;
        "
        } else {
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous = NORMAL;
        "
        };
        conn.batch_execute(pragmas)
            .map_err(diesel::r2d2::Error::QueryError)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::RunQueryDsl;

    #[test]
    fn test_database_path_strips_scheme() {
        assert_eq!(database_path("sqlite:///tmp/a.db"), "/tmp/a.db");
        assert_eq!(database_path("/tmp/a.db"), "/tmp/a.db");
    }

    #[test]
    fn test_source_pool_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let err = create_source_pool(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::Database(DatabaseError::ConnectionFailed(_))));
    }

    #[test]
    fn test_source_pool_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        let path = init(path.to_str().unwrap()).unwrap();

        let pool = create_source_pool(&path).unwrap();
        let mut conn = get_connection(&pool).unwrap();
        let result = diesel::sql_query("CREATE TABLE t (x INTEGER)").execute(&mut conn);
        assert!(result.is_err());
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.db");
        let path = init(path.to_str().unwrap()).unwrap();
        let pool = create_pool(&path).unwrap();

        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();
    }
}
