//! # Access Rule Repository
//!
//! Storage for the rules the `auth/permissions` cell evaluates. Rule
//! evaluation itself is pure and lives in `cell_core::access`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use cell_core::access::{self, AccessRule, RuleEffect, SubjectType};
use cell_core::validation::ValidationResult;
use cell_core::TenantId;

use crate::error::{DbError, DbResult};

/// A stored access rule.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccessRuleEntry {
    pub id: String,
    pub tenant_id: String,
    pub resource: String,
    pub action: String,
    pub subject_type: SubjectType,
    pub subject_id: Option<String>,
    pub effect: RuleEffect,
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AccessRuleEntry {
    /// The row as an evaluable rule.
    pub fn to_rule(&self) -> AccessRule {
        AccessRule {
            id: self.id.clone(),
            resource: self.resource.clone(),
            action: self.action.clone(),
            subject_type: self.subject_type,
            subject_id: self.subject_id.clone(),
            effect: self.effect,
            priority: self.priority,
        }
    }
}

/// Input for creating a rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccessRule {
    pub resource: String,
    pub action: String,
    pub subject_type: SubjectType,
    #[serde(default)]
    pub subject_id: Option<String>,
    pub effect: RuleEffect,
    #[serde(default)]
    pub priority: i64,
}

impl NewAccessRule {
    pub fn validate(&self) -> ValidationResult<()> {
        access::validate_rule(
            &self.resource,
            &self.action,
            self.subject_type,
            self.subject_id.as_deref(),
        )
    }
}

const RULE_SELECT: &str = "SELECT id, tenant_id, resource, action, subject_type, subject_id, \
     effect, priority, is_active, created_at FROM access_rules";

/// Repository for access rules.
#[derive(Debug, Clone)]
pub struct AccessRuleRepository {
    pool: SqlitePool,
}

impl AccessRuleRepository {
    /// Creates a new AccessRuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccessRuleRepository { pool }
    }

    /// Inserts a rule. `subject_id` is dropped for `any` rules.
    pub async fn insert(&self, tenant: &TenantId, rule: &NewAccessRule) -> DbResult<AccessRuleEntry> {
        debug!(
            tenant = %tenant,
            resource = %rule.resource,
            action = %rule.action,
            "Inserting access rule"
        );

        let id = Uuid::new_v4().to_string();
        let subject_id = match rule.subject_type {
            SubjectType::Any => None,
            _ => rule.subject_id.as_deref().map(str::trim),
        };

        sqlx::query(
            r#"
            INSERT INTO access_rules (
                id, tenant_id, resource, action, subject_type, subject_id,
                effect, priority, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)
            "#,
        )
        .bind(&id)
        .bind(tenant.as_str())
        .bind(rule.resource.trim())
        .bind(&rule.action)
        .bind(rule.subject_type)
        .bind(subject_id)
        .bind(rule.effect)
        .bind(rule.priority)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let sql = format!("{RULE_SELECT} WHERE id = ?1");
        sqlx::query_as::<_, AccessRuleEntry>(&sql)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("AccessRule", &id))
    }

    /// Lists every rule of the tenant, highest priority first.
    pub async fn list(&self, tenant: &TenantId) -> DbResult<Vec<AccessRuleEntry>> {
        let sql = format!("{RULE_SELECT} WHERE tenant_id = ?1 ORDER BY priority DESC, id");
        let rules = sqlx::query_as::<_, AccessRuleEntry>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rules)
    }

    /// Active rules of the tenant for one resource.
    pub async fn active_for_resource(&self, tenant: &TenantId, resource: &str) -> DbResult<Vec<AccessRule>> {
        let sql = format!("{RULE_SELECT} WHERE tenant_id = ?1 AND resource = ?2 AND is_active = 1");
        let rules = sqlx::query_as::<_, AccessRuleEntry>(&sql)
            .bind(tenant.as_str())
            .bind(resource)
            .fetch_all(&self.pool)
            .await?;

        Ok(rules.iter().map(AccessRuleEntry::to_rule).collect())
    }
}
