//! # cell-db: Database Layer for the Cell Gateway
//!
//! This crate provides database access for the gateway's cells and the
//! configuration resolver. It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cell Gateway Data Flow                           │
//! │                                                                         │
//! │  Cell handler (b2b/groups.create)   Resolver (exact row / default)     │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cell-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ ConfigRepo     │   │ 001_config   │  │   │
//! │  │   │ SqlitePool    │◄───│ B2bGroupRepo   │   │ 002_b2b      │  │   │
//! │  │   │               │    │ AccessRuleRepo │   │ 003_access   │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cell_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("gateway.db")).await?;
//! let groups = db.b2b_groups().list(&tenant).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::access::{AccessRuleEntry, AccessRuleRepository, NewAccessRule};
pub use repository::b2b::{B2bGroup, B2bGroupRepository, GroupChanges, GroupMember, NewGroup};
pub use repository::config::{
    ConfigRepository, FeeTierEntry, MultiplierEntry, MultiplierTable, NewFeeTier,
};
