//! # B2B Group Repository
//!
//! Database operations for B2B customer groups and their members.
//!
//! Group names are unique per tenant; a duplicate surfaces as
//! `DbError::UniqueViolation { field: "name", .. }`. Discounts are basis
//! points (`250` = 2.5%).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use cell_core::TenantId;

use crate::error::{DbError, DbResult};

/// A B2B customer group.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct B2bGroup {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_bps: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A customer's membership in a group.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub group_id: String,
    pub customer_id: String,
    pub added_at: DateTime<Utc>,
}

/// Input for creating a group.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub discount_bps: i64,
}

/// Partial update of a group; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct GroupChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_bps: Option<i64>,
    pub is_active: Option<bool>,
}

const GROUP_SELECT: &str = "SELECT id, tenant_id, name, description, discount_bps, is_active, \
     created_at, updated_at FROM b2b_groups";

/// Maps a unique violation on the group name to a field-level duplicate.
fn duplicate_name(err: sqlx::Error, name: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("name", name),
        other => other,
    }
}

/// Repository for B2B group operations.
#[derive(Debug, Clone)]
pub struct B2bGroupRepository {
    pool: SqlitePool,
}

impl B2bGroupRepository {
    /// Creates a new B2bGroupRepository.
    pub fn new(pool: SqlitePool) -> Self {
        B2bGroupRepository { pool }
    }

    /// Inserts a new group.
    ///
    /// ## Returns
    /// * `Ok(B2bGroup)` - The stored group
    /// * `Err(DbError::UniqueViolation)` - Name already used in this tenant
    pub async fn insert(&self, tenant: &TenantId, group: &NewGroup) -> DbResult<B2bGroup> {
        debug!(tenant = %tenant, name = %group.name, "Inserting B2B group");

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO b2b_groups (
                id, tenant_id, name, description, discount_bps,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
            "#,
        )
        .bind(&id)
        .bind(tenant.as_str())
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.discount_bps)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, &group.name))?;

        self.get(tenant, &id)
            .await?
            .ok_or_else(|| DbError::not_found("B2bGroup", &id))
    }

    /// Gets a group by ID within a tenant.
    pub async fn get(&self, tenant: &TenantId, id: &str) -> DbResult<Option<B2bGroup>> {
        let sql = format!("{GROUP_SELECT} WHERE id = ?1 AND tenant_id = ?2");
        let group = sqlx::query_as::<_, B2bGroup>(&sql)
            .bind(id)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(group)
    }

    /// Lists the tenant's groups by name.
    pub async fn list(&self, tenant: &TenantId) -> DbResult<Vec<B2bGroup>> {
        let sql = format!("{GROUP_SELECT} WHERE tenant_id = ?1 ORDER BY name");
        let groups = sqlx::query_as::<_, B2bGroup>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(groups)
    }

    /// Applies a partial update and returns the updated group.
    pub async fn update(&self, tenant: &TenantId, id: &str, changes: &GroupChanges) -> DbResult<B2bGroup> {
        debug!(tenant = %tenant, id = %id, "Updating B2B group");

        let result = sqlx::query(
            r#"
            UPDATE b2b_groups SET
                name = COALESCE(?3, name),
                description = COALESCE(?4, description),
                discount_bps = COALESCE(?5, discount_bps),
                is_active = COALESCE(?6, is_active),
                updated_at = ?7
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant.as_str())
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.discount_bps)
        .bind(changes.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_name(e, changes.name.as_deref().unwrap_or_default()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("B2bGroup", id));
        }

        self.get(tenant, id)
            .await?
            .ok_or_else(|| DbError::not_found("B2bGroup", id))
    }

    /// Adds a customer to a group.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Group doesn't exist in this tenant
    /// * `Err(DbError::UniqueViolation)` - Customer already a member
    pub async fn add_member(&self, tenant: &TenantId, group_id: &str, customer_id: &str) -> DbResult<GroupMember> {
        if self.get(tenant, group_id).await?.is_none() {
            return Err(DbError::not_found("B2bGroup", group_id));
        }

        debug!(tenant = %tenant, group_id = %group_id, customer_id = %customer_id, "Adding group member");

        let member = GroupMember {
            group_id: group_id.to_string(),
            customer_id: customer_id.to_string(),
            added_at: Utc::now(),
        };

        sqlx::query("INSERT INTO b2b_group_members (group_id, customer_id, added_at) VALUES (?1, ?2, ?3)")
            .bind(&member.group_id)
            .bind(&member.customer_id)
            .bind(member.added_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("customerId", customer_id),
                other => other,
            })?;

        Ok(member)
    }

    /// Removes a customer from a group.
    pub async fn remove_member(&self, tenant: &TenantId, group_id: &str, customer_id: &str) -> DbResult<()> {
        debug!(tenant = %tenant, group_id = %group_id, customer_id = %customer_id, "Removing group member");

        let result = sqlx::query(
            r#"
            DELETE FROM b2b_group_members
            WHERE group_id = ?1 AND customer_id = ?2
              AND group_id IN (SELECT id FROM b2b_groups WHERE tenant_id = ?3)
            "#,
        )
        .bind(group_id)
        .bind(customer_id)
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("GroupMember", customer_id));
        }

        Ok(())
    }

    /// Lists the members of a group.
    pub async fn members(&self, tenant: &TenantId, group_id: &str) -> DbResult<Vec<GroupMember>> {
        let members = sqlx::query_as::<_, GroupMember>(
            r#"
            SELECT m.group_id, m.customer_id, m.added_at
            FROM b2b_group_members m
            INNER JOIN b2b_groups g ON g.id = m.group_id
            WHERE m.group_id = ?1 AND g.tenant_id = ?2
            ORDER BY m.added_at, m.customer_id
            "#,
        )
        .bind(group_id)
        .bind(tenant.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }
}
