//! # Database Pool
//!
//! One `SqlitePool` per process, shared by every cell.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::new("cell-gateway.db")      DbConfig::in_memory()           │
//! │       │  file, WAL, up to 5 conns          │  one pinned connection     │
//! │       └──────────────┬─────────────────────┘                            │
//! │                      ▼                                                  │
//! │  Database::new(config) ── connect ── migrate (embedded, idempotent)    │
//! │                      │                                                  │
//! │                      ▼  cloned into GatewayContext                      │
//! │  ┌───────────────────┬────────────────────┬──────────────────────┐     │
//! │  │ db.config()       │ db.b2b_groups()    │ db.access_rules()    │     │
//! │  │ multipliers, fees │ groups, members    │ rules                │     │
//! │  └───────────────────┴────────────────────┴──────────────────────┘     │
//! │                      │                                                  │
//! │  health_check() ◄── GET /health            close() ◄── shutdown        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::access::AccessRuleRepository;
use crate::repository::b2b::B2bGroupRepository;
use crate::repository::config::ConfigRepository;

/// Path value that selects an in-memory database.
const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives and how the pool behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/cell-gateway/gateway.db").max_connections(10);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    /// Default: 5
    pub max_connections: u32,
    /// Default: 1
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection. Default: 30 seconds
    pub connect_timeout: Duration,
    /// `None` keeps idle connections open. Default: 10 minutes
    pub idle_timeout: Option<Duration>,
    /// Apply embedded migrations on connect. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// A file-backed database, created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    /// A private in-memory database for tests.
    ///
    /// SQLite drops an in-memory database with its last connection, so the
    /// pool is pinned to exactly one connection that never expires.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            // WAL: readers and the writer do not block each other
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        // Off by default in SQLite; group members rely on it
        Ok(options.foreign_keys(true))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout);

        if self.is_in_memory() {
            options.max_lifetime(None)
        } else {
            options
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Pool handle with repository accessors. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and, unless disabled, migrates.
    ///
    /// ## Returns
    /// * `Err(DbError::ConnectionFailed)` - File could not be opened or created
    /// * `Err(DbError::MigrationFailed)` - An embedded migration failed
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        let connect_options = config.connect_options()?;
        let pool = config
            .pool_options()
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(
            max_connections = config.max_connections,
            in_memory = config.is_in_memory(),
            "Pool connected"
        );

        let db = Database { pool };
        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await?;
        info!("Database schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Multipliers and fee tiers.
    pub fn config(&self) -> ConfigRepository {
        ConfigRepository::new(self.pool.clone())
    }

    pub fn b2b_groups(&self) -> B2bGroupRepository {
        B2bGroupRepository::new(self.pool.clone())
    }

    pub fn access_rules(&self) -> AccessRuleRepository {
        AccessRuleRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later queries fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    /// True if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 3);
    }

    #[tokio::test]
    async fn test_closed_database_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_pools() {
        let path = std::env::temp_dir().join(format!("cell-db-{}.db", uuid::Uuid::new_v4()));

        let first = Database::new(DbConfig::new(&path)).await.unwrap();
        first.close().await;

        let second = Database::new(DbConfig::new(&path).run_migrations(false)).await.unwrap();
        let (total, applied) = migrations::migration_status(second.pool()).await.unwrap();
        assert_eq!(total, applied);
        second.close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());

        let memory = DbConfig::in_memory();
        assert!(memory.is_in_memory());
        assert_eq!(memory.max_connections, 1);
        assert!(memory.idle_timeout.is_none());
    }
}
