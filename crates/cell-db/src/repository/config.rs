//! # Configuration Repository
//!
//! Tenant-scoped configuration rows read by the resolver and written by the
//! `config/multipliers` cell.
//!
//! ## Tables
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  region_multipliers      (tenant_id, region_code) → multiplier          │
//! │  item_type_multipliers   (tenant_id, item_type)   → multiplier          │
//! │  fee_tiers               (tenant_id, min_amount)  → [min, max) + rule   │
//! │                                                                         │
//! │  Every table: is_default, is_active                                     │
//! │  At most ONE active default per tenant per table:                       │
//! │    • partial unique index (schema)                                      │
//! │    • upserts clear the previous default in the same transaction         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use cell_core::calculator::select_fee_tier;
use cell_core::validation::{self, ValidationResult};
use cell_core::{ConfigKind, FeeRule, FeeTier, TenantId};

use super::{decimal_text, parse_decimal, parse_optional_decimal};
use crate::error::{DbError, DbResult};

// =============================================================================
// Multiplier Tables
// =============================================================================

/// The two tables holding plain multipliers. They share a shape and differ
/// only in name and key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierTable {
    Region,
    ItemType,
}

impl MultiplierTable {
    fn table(self) -> &'static str {
        match self {
            MultiplierTable::Region => "region_multipliers",
            MultiplierTable::ItemType => "item_type_multipliers",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            MultiplierTable::Region => "region_code",
            MultiplierTable::ItemType => "item_type",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            MultiplierTable::Region => "RegionMultiplier",
            MultiplierTable::ItemType => "ItemTypeMultiplier",
        }
    }

    /// The configuration kind stored in this table.
    pub fn kind(self) -> ConfigKind {
        match self {
            MultiplierTable::Region => ConfigKind::Region,
            MultiplierTable::ItemType => ConfigKind::ItemType,
        }
    }

    /// The table for a kind; `None` for fee tiers.
    pub fn for_kind(kind: ConfigKind) -> Option<Self> {
        match kind {
            ConfigKind::Region => Some(MultiplierTable::Region),
            ConfigKind::ItemType => Some(MultiplierTable::ItemType),
            ConfigKind::FeeTier => None,
        }
    }

    fn select(self) -> String {
        format!(
            "SELECT id, tenant_id, {key} AS config_key, multiplier, is_default, is_active, \
             created_at, updated_at FROM {table}",
            key = self.key_column(),
            table = self.table()
        )
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct MultiplierRecord {
    id: String,
    tenant_id: String,
    config_key: String,
    multiplier: String,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A region or item type multiplier row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplierEntry {
    pub id: String,
    pub tenant_id: String,
    /// Region code or item type.
    pub key: String,
    pub multiplier: Decimal,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MultiplierRecord> for MultiplierEntry {
    type Error = DbError;

    fn try_from(record: MultiplierRecord) -> DbResult<Self> {
        Ok(MultiplierEntry {
            multiplier: parse_decimal("multiplier", &record.multiplier)?,
            id: record.id,
            tenant_id: record.tenant_id,
            key: record.config_key,
            is_default: record.is_default,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

// =============================================================================
// Fee Tiers
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct FeeTierRecord {
    id: String,
    tenant_id: String,
    min_amount: String,
    max_amount: Option<String>,
    percentage: Option<String>,
    flat_fee: Option<String>,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const FEE_TIER_SELECT: &str = "SELECT id, tenant_id, min_amount, max_amount, percentage, flat_fee, \
     is_default, is_active, created_at, updated_at FROM fee_tiers";

/// A fee tier row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTierEntry {
    pub id: String,
    pub tenant_id: String,
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub flat_fee: Option<Decimal>,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeeTierEntry {
    /// The row as a domain fee tier.
    pub fn tier(&self) -> FeeTier {
        FeeTier {
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            rule: FeeRule {
                percentage: self.percentage,
                flat_fee: self.flat_fee,
            },
        }
    }
}

impl TryFrom<FeeTierRecord> for FeeTierEntry {
    type Error = DbError;

    fn try_from(record: FeeTierRecord) -> DbResult<Self> {
        Ok(FeeTierEntry {
            min_amount: parse_decimal("min_amount", &record.min_amount)?,
            max_amount: parse_optional_decimal("max_amount", record.max_amount.as_deref())?,
            percentage: parse_optional_decimal("percentage", record.percentage.as_deref())?,
            flat_fee: parse_optional_decimal("flat_fee", record.flat_fee.as_deref())?,
            id: record.id,
            tenant_id: record.tenant_id,
            is_default: record.is_default,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// Input for creating or replacing a fee tier.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeeTier {
    pub min_amount: Decimal,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    #[serde(default)]
    pub percentage: Option<Decimal>,
    #[serde(default)]
    pub flat_fee: Option<Decimal>,
    #[serde(default)]
    pub is_default: bool,
}

impl NewFeeTier {
    /// Validates bounds and fee kind.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate_fee_tier(self.min_amount, self.max_amount, self.percentage, self.flat_fee)
    }
}

fn collect<R, T>(records: Vec<R>) -> DbResult<Vec<T>>
where
    T: TryFrom<R, Error = DbError>,
{
    records.into_iter().map(T::try_from).collect()
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for configuration rows.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.config();
///
/// repo.upsert_multiplier(MultiplierTable::Region, &tenant, "NG", dec!(1.2), true).await?;
/// let row = repo.find_multiplier(MultiplierTable::Region, &tenant, "NG").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    /// Creates a new ConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ConfigRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Multipliers
    // -------------------------------------------------------------------------

    /// Finds the active row for an exact key.
    ///
    /// `key` must already be normalised (see `LookupKey`).
    pub async fn find_multiplier(
        &self,
        table: MultiplierTable,
        tenant: &TenantId,
        key: &str,
    ) -> DbResult<Option<MultiplierEntry>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 AND {} = ?2 AND is_active = 1",
            table.select(),
            table.key_column()
        );

        let record = sqlx::query_as::<_, MultiplierRecord>(&sql)
            .bind(tenant.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        record.map(MultiplierEntry::try_from).transpose()
    }

    /// Finds the tenant's active default row.
    pub async fn default_multiplier(
        &self,
        table: MultiplierTable,
        tenant: &TenantId,
    ) -> DbResult<Option<MultiplierEntry>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 AND is_default = 1 AND is_active = 1",
            table.select()
        );

        let record = sqlx::query_as::<_, MultiplierRecord>(&sql)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await?;

        record.map(MultiplierEntry::try_from).transpose()
    }

    /// Lists every row of the tenant, including inactive ones.
    pub async fn list_multipliers(
        &self,
        table: MultiplierTable,
        tenant: &TenantId,
    ) -> DbResult<Vec<MultiplierEntry>> {
        let sql = format!(
            "{} WHERE tenant_id = ?1 ORDER BY {}",
            table.select(),
            table.key_column()
        );

        let records = sqlx::query_as::<_, MultiplierRecord>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;

        collect(records)
    }

    /// Creates or replaces the row for a key and (re)activates it.
    ///
    /// ## Default Handling
    /// ```text
    /// is_default = true ──► BEGIN
    ///                       UPDATE … SET is_default = 0  (previous default)
    ///                       INSERT … ON CONFLICT DO UPDATE
    ///                       COMMIT
    /// ```
    pub async fn upsert_multiplier(
        &self,
        table: MultiplierTable,
        tenant: &TenantId,
        key: &str,
        multiplier: Decimal,
        is_default: bool,
    ) -> DbResult<MultiplierEntry> {
        debug!(table = table.table(), tenant = %tenant, key = %key, "Upserting multiplier");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if is_default {
            let clear = format!(
                "UPDATE {table} SET is_default = 0, updated_at = ?1 \
                 WHERE tenant_id = ?2 AND is_default = 1 AND {key} != ?3",
                table = table.table(),
                key = table.key_column()
            );
            sqlx::query(&clear)
                .bind(now)
                .bind(tenant.as_str())
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        let upsert = format!(
            "INSERT INTO {table} (id, tenant_id, {key}, multiplier, is_default, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7) \
             ON CONFLICT (tenant_id, {key}) DO UPDATE SET \
                 multiplier = excluded.multiplier, \
                 is_default = excluded.is_default, \
                 is_active = 1, \
                 updated_at = excluded.updated_at",
            table = table.table(),
            key = table.key_column()
        );
        sqlx::query(&upsert)
            .bind(Uuid::new_v4().to_string())
            .bind(tenant.as_str())
            .bind(key)
            .bind(decimal_text(multiplier))
            .bind(is_default)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let select = format!("{} WHERE tenant_id = ?1 AND {} = ?2", table.select(), table.key_column());
        let record = sqlx::query_as::<_, MultiplierRecord>(&select)
            .bind(tenant.as_str())
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        MultiplierEntry::try_from(record)
    }

    /// Marks a row inactive and returns it.
    pub async fn deactivate_multiplier(
        &self,
        table: MultiplierTable,
        tenant: &TenantId,
        id: &str,
    ) -> DbResult<MultiplierEntry> {
        debug!(table = table.table(), tenant = %tenant, id = %id, "Deactivating multiplier");

        let sql = format!(
            "UPDATE {} SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND tenant_id = ?3",
            table.table()
        );
        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .bind(tenant.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(table.entity(), id));
        }

        let select = format!("{} WHERE id = ?1", table.select());
        let record = sqlx::query_as::<_, MultiplierRecord>(&select)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        MultiplierEntry::try_from(record)
    }

    // -------------------------------------------------------------------------
    // Fee Tiers
    // -------------------------------------------------------------------------

    /// Finds the active tier containing `amount`.
    ///
    /// Bounds are decimals stored as TEXT, so range matching happens here
    /// rather than in SQL.
    pub async fn find_fee_tier(&self, tenant: &TenantId, amount: Decimal) -> DbResult<Option<FeeTier>> {
        let sql = format!("{FEE_TIER_SELECT} WHERE tenant_id = ?1 AND is_active = 1");
        let records = sqlx::query_as::<_, FeeTierRecord>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;

        let tiers: Vec<FeeTier> = collect::<_, FeeTierEntry>(records)?
            .iter()
            .map(FeeTierEntry::tier)
            .collect();

        Ok(select_fee_tier(&tiers, amount).cloned())
    }

    /// Finds the tenant's active default tier.
    pub async fn default_fee_tier(&self, tenant: &TenantId) -> DbResult<Option<FeeTierEntry>> {
        let sql = format!("{FEE_TIER_SELECT} WHERE tenant_id = ?1 AND is_default = 1 AND is_active = 1");
        let record = sqlx::query_as::<_, FeeTierRecord>(&sql)
            .bind(tenant.as_str())
            .fetch_optional(&self.pool)
            .await?;

        record.map(FeeTierEntry::try_from).transpose()
    }

    /// Lists every tier of the tenant, ascending by lower bound.
    pub async fn list_fee_tiers(&self, tenant: &TenantId) -> DbResult<Vec<FeeTierEntry>> {
        let sql = format!("{FEE_TIER_SELECT} WHERE tenant_id = ?1");
        let records = sqlx::query_as::<_, FeeTierRecord>(&sql)
            .bind(tenant.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut tiers: Vec<FeeTierEntry> = collect(records)?;
        tiers.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
        Ok(tiers)
    }

    /// Creates or replaces the tier starting at `min_amount`.
    pub async fn upsert_fee_tier(&self, tenant: &TenantId, tier: &NewFeeTier) -> DbResult<FeeTierEntry> {
        let min_amount = decimal_text(tier.min_amount);
        debug!(tenant = %tenant, min_amount = %min_amount, "Upserting fee tier");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if tier.is_default {
            sqlx::query(
                "UPDATE fee_tiers SET is_default = 0, updated_at = ?1 \
                 WHERE tenant_id = ?2 AND is_default = 1 AND min_amount != ?3",
            )
            .bind(now)
            .bind(tenant.as_str())
            .bind(&min_amount)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO fee_tiers (
                id, tenant_id, min_amount, max_amount, percentage, flat_fee,
                is_default, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
            ON CONFLICT (tenant_id, min_amount) DO UPDATE SET
                max_amount = excluded.max_amount,
                percentage = excluded.percentage,
                flat_fee = excluded.flat_fee,
                is_default = excluded.is_default,
                is_active = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(tenant.as_str())
        .bind(&min_amount)
        .bind(tier.max_amount.map(decimal_text))
        .bind(tier.percentage.map(decimal_text))
        .bind(tier.flat_fee.map(decimal_text))
        .bind(tier.is_default)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{FEE_TIER_SELECT} WHERE tenant_id = ?1 AND min_amount = ?2");
        let record = sqlx::query_as::<_, FeeTierRecord>(&sql)
            .bind(tenant.as_str())
            .bind(&min_amount)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        FeeTierEntry::try_from(record)
    }

    /// Marks a tier inactive and returns it.
    pub async fn deactivate_fee_tier(&self, tenant: &TenantId, id: &str) -> DbResult<FeeTierEntry> {
        debug!(tenant = %tenant, id = %id, "Deactivating fee tier");

        let result = sqlx::query(
            "UPDATE fee_tiers SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND tenant_id = ?3",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(tenant.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FeeTier", id));
        }

        let sql = format!("{FEE_TIER_SELECT} WHERE id = ?1");
        let record = sqlx::query_as::<_, FeeTierRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        FeeTierEntry::try_from(record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use rust_decimal_macros::dec;

    async fn setup() -> (ConfigRepository, TenantId) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (db.config(), TenantId::parse("t1").unwrap())
    }

    #[tokio::test]
    async fn test_upsert_and_find_region() {
        let (repo, tenant) = setup().await;

        let entry = repo
            .upsert_multiplier(MultiplierTable::Region, &tenant, "NG", dec!(1.25), false)
            .await
            .unwrap();
        assert_eq!(entry.key, "NG");
        assert_eq!(entry.multiplier, dec!(1.25));
        assert!(entry.is_active);

        let found = repo
            .find_multiplier(MultiplierTable::Region, &tenant, "NG")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, entry.id);

        // Replace keeps the row identity
        let replaced = repo
            .upsert_multiplier(MultiplierTable::Region, &tenant, "NG", dec!(1.5), false)
            .await
            .unwrap();
        assert_eq!(replaced.id, entry.id);
        assert_eq!(replaced.multiplier, dec!(1.5));
    }

    #[tokio::test]
    async fn test_rows_are_tenant_scoped() {
        let (repo, tenant) = setup().await;
        let other = TenantId::parse("t2").unwrap();

        repo.upsert_multiplier(MultiplierTable::ItemType, &tenant, "food", dec!(0.5), true)
            .await
            .unwrap();

        assert!(repo
            .find_multiplier(MultiplierTable::ItemType, &other, "food")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .default_multiplier(MultiplierTable::ItemType, &other)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_new_default_replaces_previous() {
        let (repo, tenant) = setup().await;

        repo.upsert_multiplier(MultiplierTable::Region, &tenant, "NG", dec!(1.1), true)
            .await
            .unwrap();
        repo.upsert_multiplier(MultiplierTable::Region, &tenant, "GH", dec!(1.3), true)
            .await
            .unwrap();

        let default = repo
            .default_multiplier(MultiplierTable::Region, &tenant)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(default.key, "GH");

        let all = repo.list_multipliers(MultiplierTable::Region, &tenant).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|e| e.is_default).count(), 1);
    }

    #[tokio::test]
    async fn test_deactivated_rows_are_not_found() {
        let (repo, tenant) = setup().await;

        let entry = repo
            .upsert_multiplier(MultiplierTable::Region, &tenant, "NG", dec!(2), true)
            .await
            .unwrap();
        let deactivated = repo
            .deactivate_multiplier(MultiplierTable::Region, &tenant, &entry.id)
            .await
            .unwrap();
        assert!(!deactivated.is_active);

        assert!(repo
            .find_multiplier(MultiplierTable::Region, &tenant, "NG")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .default_multiplier(MultiplierTable::Region, &tenant)
            .await
            .unwrap()
            .is_none());

        let missing = repo
            .deactivate_multiplier(MultiplierTable::Region, &tenant, "nope")
            .await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_fee_tier_lookup() {
        let (repo, tenant) = setup().await;

        repo.upsert_fee_tier(
            &tenant,
            &NewFeeTier {
                min_amount: dec!(0),
                max_amount: Some(dec!(1000)),
                percentage: None,
                flat_fee: Some(dec!(5)),
                is_default: true,
            },
        )
        .await
        .unwrap();
        repo.upsert_fee_tier(
            &tenant,
            &NewFeeTier {
                min_amount: dec!(1000),
                max_amount: None,
                percentage: Some(dec!(0.015)),
                flat_fee: None,
                is_default: false,
            },
        )
        .await
        .unwrap();

        let small = repo.find_fee_tier(&tenant, dec!(999.99)).await.unwrap().unwrap();
        assert_eq!(small.rule, FeeRule::flat(dec!(5)));

        let large = repo.find_fee_tier(&tenant, dec!(1000)).await.unwrap().unwrap();
        assert_eq!(large.rule, FeeRule::percentage(dec!(0.015)));

        let default = repo.default_fee_tier(&tenant).await.unwrap().unwrap();
        assert_eq!(default.min_amount, dec!(0));

        let listed = repo.list_fee_tiers(&tenant).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].min_amount < listed[1].min_amount);
    }

    #[tokio::test]
    async fn test_fee_tier_upsert_normalises_bound() {
        let (repo, tenant) = setup().await;
        let tier = |min| NewFeeTier {
            min_amount: min,
            max_amount: None,
            percentage: None,
            flat_fee: Some(dec!(1)),
            is_default: false,
        };

        let first = repo.upsert_fee_tier(&tenant, &tier(dec!(100.00))).await.unwrap();
        let second = repo.upsert_fee_tier(&tenant, &tier(dec!(100))).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_fee_tiers(&tenant).await.unwrap().len(), 1);
    }

    #[test]
    fn test_new_fee_tier_validation() {
        let tier = NewFeeTier {
            min_amount: dec!(10),
            max_amount: Some(dec!(5)),
            percentage: None,
            flat_fee: Some(dec!(1)),
            is_default: false,
        };
        assert!(tier.validate().is_err());
    }
}
