//! # Configuration Resolver
//!
//! Turns `(tenant, lookup key)` into an effective configuration value.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve(tenant, key)                                                   │
//! │                                                                         │
//! │  1. cache.get(cell:cfg:{tenant}:{kind}:{key})  ── hit ──► Cached       │
//! │        │ miss / cache error (logged)                                    │
//! │        ▼                                                                │
//! │  2. store.find_exact(tenant, key)  ── row ──► Stored  (+ cache.set)    │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  3. store.find_default(tenant, kind)  ── row ──► StoredDefault         │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  4. process constant  ──────────────────────► Fallback                 │
//! │                                                                         │
//! │  store error at 2 or 3  ────────────────────► ErrorFallback            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `resolve` has no error path: every branch ends in a value. Failures are
//! logged at `warn` and reported through [`ConfigSource`].
//!
//! Concurrent misses on the same key may both fill the cache; last write
//! wins, and both writes carry the same stored value.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use cell_core::{ConfigKind, ConfigSource, ConfigValue, FeeRule, LookupKey, Resolution, TenantId};
use cell_db::{Database, DbResult, MultiplierTable};

use crate::cache::CacheStore;

/// How long a resolved value stays cached unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

// =============================================================================
// Store Seam
// =============================================================================

/// Read access to stored configuration rows.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// The tenant's active row for exactly this key.
    async fn find_exact(&self, tenant: &TenantId, key: &LookupKey) -> DbResult<Option<ConfigValue>>;

    /// The tenant's active default row of this kind.
    async fn find_default(&self, tenant: &TenantId, kind: ConfigKind) -> DbResult<Option<ConfigValue>>;
}

#[async_trait]
impl ConfigStore for Database {
    async fn find_exact(&self, tenant: &TenantId, key: &LookupKey) -> DbResult<Option<ConfigValue>> {
        let repo = self.config();

        let value = match key {
            LookupKey::Region(code) => repo
                .find_multiplier(MultiplierTable::Region, tenant, code)
                .await?
                .map(|entry| ConfigValue::Multiplier(entry.multiplier)),
            LookupKey::ItemType(name) => repo
                .find_multiplier(MultiplierTable::ItemType, tenant, name)
                .await?
                .map(|entry| ConfigValue::Multiplier(entry.multiplier)),
            LookupKey::FeeTier(amount) => repo
                .find_fee_tier(tenant, *amount)
                .await?
                .map(|tier| ConfigValue::Fee(tier.rule)),
        };

        Ok(value)
    }

    async fn find_default(&self, tenant: &TenantId, kind: ConfigKind) -> DbResult<Option<ConfigValue>> {
        let repo = self.config();

        let value = match kind {
            ConfigKind::Region => repo
                .default_multiplier(MultiplierTable::Region, tenant)
                .await?
                .map(|entry| ConfigValue::Multiplier(entry.multiplier)),
            ConfigKind::ItemType => repo
                .default_multiplier(MultiplierTable::ItemType, tenant)
                .await?
                .map(|entry| ConfigValue::Multiplier(entry.multiplier)),
            ConfigKind::FeeTier => repo
                .default_fee_tier(tenant)
                .await?
                .map(|entry| ConfigValue::Fee(entry.tier().rule)),
        };

        Ok(value)
    }
}

// =============================================================================
// Process Constants
// =============================================================================

/// Values used when a tenant has no row at all, or the store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackConstants {
    pub region_multiplier: Decimal,
    pub item_type_multiplier: Decimal,
    pub fee_rule: FeeRule,
}

impl Default for FallbackConstants {
    fn default() -> Self {
        FallbackConstants {
            region_multiplier: Decimal::ONE,
            item_type_multiplier: Decimal::ONE,
            fee_rule: FeeRule::flat(Decimal::ZERO),
        }
    }
}

impl FallbackConstants {
    pub fn value_for(&self, kind: ConfigKind) -> ConfigValue {
        match kind {
            ConfigKind::Region => ConfigValue::Multiplier(self.region_multiplier),
            ConfigKind::ItemType => ConfigValue::Multiplier(self.item_type_multiplier),
            ConfigKind::FeeTier => ConfigValue::Fee(self.fee_rule),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Read-through resolver over a cache and a store.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
    cache: Arc<dyn CacheStore>,
    constants: FallbackConstants,
    ttl: Duration,
}

impl fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("cache", &self.cache.backend())
            .field("constants", &self.constants)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<dyn CacheStore>) -> Self {
        ConfigResolver {
            store,
            cache,
            constants: FallbackConstants::default(),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_constants(mut self, constants: FallbackConstants) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn constants(&self) -> &FallbackConstants {
        &self.constants
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Resolves one key for a tenant. Always returns a value.
    pub async fn resolve(&self, tenant: &TenantId, key: &LookupKey) -> Resolution {
        let cache_key = key.cache_key(tenant);

        if let Some(value) = self.cached(&cache_key).await {
            debug!(tenant = %tenant, key = %key, "Configuration cache hit");
            return Resolution::new(value, ConfigSource::Cached);
        }

        match self.store.find_exact(tenant, key).await {
            Ok(Some(value)) => {
                self.fill(&cache_key, &value).await;
                return Resolution::new(value, ConfigSource::Stored);
            }
            Ok(None) => {}
            Err(e) => return self.degrade(tenant, key, &e),
        }

        match self.store.find_default(tenant, key.kind()).await {
            Ok(Some(value)) => Resolution::new(value, ConfigSource::StoredDefault),
            Ok(None) => {
                debug!(tenant = %tenant, key = %key, "No stored configuration, using constant");
                Resolution::new(self.constants.value_for(key.kind()), ConfigSource::Fallback)
            }
            Err(e) => self.degrade(tenant, key, &e),
        }
    }

    /// Drops the cached value for one key.
    pub async fn invalidate(&self, tenant: &TenantId, key: &LookupKey) {
        let cache_key = key.cache_key(tenant);
        if let Err(e) = self.cache.delete(&cache_key).await {
            warn!(key = %cache_key, error = %e, "Cache invalidation failed");
        }
    }

    /// Drops every cached value of one kind for a tenant. Fee tier entries
    /// are keyed by amount, so a tier write has to clear them all.
    pub async fn invalidate_kind(&self, tenant: &TenantId, kind: ConfigKind) {
        let prefix = LookupKey::cache_prefix(tenant, kind);
        match self.cache.delete_prefix(&prefix).await {
            Ok(removed) => debug!(prefix = %prefix, removed, "Cache entries invalidated"),
            Err(e) => warn!(prefix = %prefix, error = %e, "Cache invalidation failed"),
        }
    }

    async fn cached(&self, cache_key: &str) -> Option<ConfigValue> {
        match self.cache.get(cache_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %cache_key, error = %e, "Unreadable cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn fill(&self, cache_key: &str, value: &ConfigValue) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Could not encode cache entry");
                return;
            }
        };

        if let Err(e) = self.cache.set(cache_key, &raw, self.ttl).await {
            warn!(key = %cache_key, error = %e, "Cache write failed");
        }
    }

    fn degrade(&self, tenant: &TenantId, key: &LookupKey, err: &dyn std::error::Error) -> Resolution {
        warn!(
            tenant = %tenant,
            key = %key,
            error = %err,
            "Configuration store failed, using constant"
        );
        Resolution::new(self.constants.value_for(key.kind()), ConfigSource::ErrorFallback)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheResult, MemoryCache};
    use cell_db::{DbConfig, DbError, NewFeeTier};
    use rust_decimal_macros::dec;

    /// A store whose every query fails.
    pub(crate) struct FailingStore;

    #[async_trait]
    impl ConfigStore for FailingStore {
        async fn find_exact(&self, _: &TenantId, _: &LookupKey) -> DbResult<Option<ConfigValue>> {
            Err(DbError::ConnectionFailed("database is locked".to_string()))
        }

        async fn find_default(&self, _: &TenantId, _: ConfigKind) -> DbResult<Option<ConfigValue>> {
            Err(DbError::ConnectionFailed("database is locked".to_string()))
        }
    }

    /// A cache whose every command fails.
    pub(crate) struct FailingCache;

    #[async_trait]
    impl CacheStore for FailingCache {
        async fn get(&self, _: &str) -> CacheResult<Option<String>> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }
        async fn set(&self, _: &str, _: &str, _: Duration) -> CacheResult<()> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }
        async fn delete(&self, _: &str) -> CacheResult<()> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }
        async fn delete_prefix(&self, _: &str) -> CacheResult<u64> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }
        async fn ping(&self) -> CacheResult<()> {
            Err(CacheError::ConnectionFailed("refused".to_string()))
        }
        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    fn tenant() -> TenantId {
        TenantId::parse("t1").unwrap()
    }

    async fn setup() -> (ConfigResolver, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let resolver = ConfigResolver::new(Arc::new(db.clone()), Arc::new(MemoryCache::new()));
        (resolver, db)
    }

    #[tokio::test]
    async fn test_unknown_region_falls_back_to_constant() {
        let (resolver, _db) = setup().await;

        let resolution = resolver.resolve(&tenant(), &LookupKey::region("UNKNOWN_REGION")).await;
        assert_eq!(resolution.value, ConfigValue::Multiplier(Decimal::ONE));
        assert_eq!(resolution.source, ConfigSource::Fallback);
    }

    #[tokio::test]
    async fn test_stored_value_is_cached_on_second_resolve() {
        let (resolver, db) = setup().await;
        db.config()
            .upsert_multiplier(MultiplierTable::Region, &tenant(), "GH", dec!(1.1), false)
            .await
            .unwrap();

        let key = LookupKey::region("gh");
        let first = resolver.resolve(&tenant(), &key).await;
        let second = resolver.resolve(&tenant(), &key).await;

        assert_eq!(first.source, ConfigSource::Stored);
        assert_eq!(second.source, ConfigSource::Cached);
        assert_eq!(first.value, second.value);
        assert_eq!(second.value.as_multiplier(), Some(dec!(1.1)));
    }

    #[tokio::test]
    async fn test_tenant_default_applies_to_unknown_key() {
        let (resolver, db) = setup().await;
        db.config()
            .upsert_multiplier(MultiplierTable::ItemType, &tenant(), "product", dec!(0.9), true)
            .await
            .unwrap();

        let resolution = resolver.resolve(&tenant(), &LookupKey::item_type("gadget")).await;
        assert_eq!(resolution.source, ConfigSource::StoredDefault);
        assert_eq!(resolution.value.as_multiplier(), Some(dec!(0.9)));

        // Another tenant doesn't see it
        let other = TenantId::parse("t2").unwrap();
        let resolution = resolver.resolve(&other, &LookupKey::item_type("gadget")).await;
        assert_eq!(resolution.source, ConfigSource::Fallback);
    }

    #[tokio::test]
    async fn test_fee_tier_lookup_by_amount() {
        let (resolver, db) = setup().await;
        db.config()
            .upsert_fee_tier(
                &tenant(),
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

        let high = resolver.resolve(&tenant(), &LookupKey::fee_tier(dec!(2000))).await;
        assert_eq!(high.source, ConfigSource::Stored);
        assert_eq!(high.value.as_fee_rule(), Some(FeeRule::percentage(dec!(0.015))));

        let low = resolver.resolve(&tenant(), &LookupKey::fee_tier(dec!(10))).await;
        assert_eq!(low.source, ConfigSource::Fallback);
        assert_eq!(low.value.as_fee_rule(), Some(FeeRule::flat(Decimal::ZERO)));
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_error_fallback() {
        let resolver = ConfigResolver::new(Arc::new(FailingStore), Arc::new(MemoryCache::new()))
            .with_constants(FallbackConstants {
                region_multiplier: dec!(1.05),
                ..FallbackConstants::default()
            });

        let resolution = resolver.resolve(&tenant(), &LookupKey::region("NG")).await;
        assert_eq!(resolution.source, ConfigSource::ErrorFallback);
        assert_eq!(resolution.value.as_multiplier(), Some(dec!(1.05)));
    }

    #[tokio::test]
    async fn test_cache_failure_is_a_miss() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.config()
            .upsert_multiplier(MultiplierTable::Region, &tenant(), "KE", dec!(1.25), false)
            .await
            .unwrap();
        let resolver = ConfigResolver::new(Arc::new(db), Arc::new(FailingCache));

        let key = LookupKey::region("KE");
        for _ in 0..2 {
            let resolution = resolver.resolve(&tenant(), &key).await;
            assert_eq!(resolution.source, ConfigSource::Stored);
            assert_eq!(resolution.value.as_multiplier(), Some(dec!(1.25)));
        }

        // Invalidation against a dead cache is logged, not raised
        resolver.invalidate(&tenant(), &key).await;
        resolver.invalidate_kind(&tenant(), ConfigKind::Region).await;
    }

    #[tokio::test]
    async fn test_invalidate_forces_store_read() {
        let (resolver, db) = setup().await;
        let key = LookupKey::region("NG");
        db.config()
            .upsert_multiplier(MultiplierTable::Region, &tenant(), "NG", dec!(1.0), false)
            .await
            .unwrap();

        resolver.resolve(&tenant(), &key).await;
        db.config()
            .upsert_multiplier(MultiplierTable::Region, &tenant(), "NG", dec!(1.3), false)
            .await
            .unwrap();

        // Stale until invalidated
        assert_eq!(resolver.resolve(&tenant(), &key).await.value.as_multiplier(), Some(dec!(1.0)));

        resolver.invalidate(&tenant(), &key).await;
        let fresh = resolver.resolve(&tenant(), &key).await;
        assert_eq!(fresh.source, ConfigSource::Stored);
        assert_eq!(fresh.value.as_multiplier(), Some(dec!(1.3)));
    }
}
