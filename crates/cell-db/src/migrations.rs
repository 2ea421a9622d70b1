//! # Database Migrations
//!
//! Embedded SQL migrations for the Cell Gateway.
//!
//! ## Migration Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  migrations/                                                            │
//! │  ├── 001_configuration.sql  region / item type multipliers, fee tiers  │
//! │  ├── 002_b2b_groups.sql     groups + members                            │
//! │  └── 003_access_rules.sql   rules for auth/permissions                  │
//! │                                                                         │
//! │  Applied in filename order, each inside its own transaction,            │
//! │  recorded in _sqlx_migrations.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Applied files are checksummed; schema changes go in a new `NNN_*.sql`
//! file, never in an edit to an applied one.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Migrations embedded at compile time from this crate's `migrations/`
/// directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies whatever the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Applying migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// `(embedded, applied)` migration counts.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await?;

    Ok((MIGRATOR.migrations.len(), applied.max(0) as usize))
}
