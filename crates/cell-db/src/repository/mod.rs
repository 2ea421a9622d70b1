//! # Repository Module
//!
//! Database repository implementations for the Cell Gateway.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cell handler                                                           │
//! │       │                                                                 │
//! │       │  ctx.db().b2b_groups().insert(&tenant, &group)                 │
//! │       ▼                                                                 │
//! │  B2bGroupRepository                                                     │
//! │  ├── insert / get / list / update                                       │
//! │  └── add_member / remove_member / members                              │
//! │       │                                                                 │
//! │       │  SQL, always filtered by tenant_id                              │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`config::ConfigRepository`] - Multipliers and fee tiers
//! - [`b2b::B2bGroupRepository`] - B2B groups and their members
//! - [`access::AccessRuleRepository`] - Access rules

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

pub mod access;
pub mod b2b;
pub mod config;

/// Parses a decimal stored as TEXT.
pub(crate) fn parse_decimal(column: &str, raw: &str) -> DbResult<Decimal> {
    Decimal::from_str(raw).map_err(|_| DbError::InvalidData {
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Parses an optional decimal stored as nullable TEXT.
pub(crate) fn parse_optional_decimal(column: &str, raw: Option<&str>) -> DbResult<Option<Decimal>> {
    raw.map(|value| parse_decimal(column, value)).transpose()
}

/// Canonical TEXT form of a decimal, so `1.50` and `1.5` are stored alike.
pub(crate) fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}
