//! # Gateway Context
//!
//! Everything a cell handler may touch, passed explicitly on every call.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Process entry point (gateway-api main)                                 │
//! │       │ builds once                                                     │
//! │       ▼                                                                 │
//! │  GatewayContext (Clone: all fields are handles)                        │
//! │  ├── Database          - sqlx pool handle                              │
//! │  ├── ConfigResolver    - cache + store + constants                     │
//! │  ├── Arc<Router>       - immutable dispatch table                      │
//! │  └── Arc<Settings>     - currencies, fallback constants, TTL           │
//! │       │                                                                 │
//! │       ▼ cloned into every invocation                                    │
//! │  handler(ctx, payload)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cell_db::Database;

use crate::cache::CacheStore;
use crate::cells;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::resolver::{ConfigResolver, FallbackConstants, DEFAULT_CACHE_TTL};
use crate::router::{CellId, Channel, Destination, RegistrationError, Router};

/// Process-wide settings the cells read.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Values used when no configuration row applies.
    pub fallback: FallbackConstants,
    /// Lifetime of cached configuration values.
    pub cache_ttl: Duration,
    /// Currency for regions without an entry in `region_currencies`.
    pub default_currency: String,
    /// Region code (upper case) to ISO currency code.
    pub region_currencies: HashMap<String, String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        GatewaySettings {
            fallback: FallbackConstants::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            default_currency: "USD".to_string(),
            region_currencies: HashMap::new(),
        }
    }
}

impl GatewaySettings {
    /// Currency of a normalised region code.
    pub fn currency_for(&self, region: &str) -> &str {
        self.region_currencies
            .get(region)
            .map(String::as_str)
            .unwrap_or(&self.default_currency)
    }
}

/// Shared handles for one gateway process.
#[derive(Clone)]
pub struct GatewayContext {
    db: Database,
    resolver: ConfigResolver,
    router: Arc<Router<GatewayContext>>,
    settings: Arc<GatewaySettings>,
}

impl fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayContext")
            .field("resolver", &self.resolver)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl GatewayContext {
    pub fn new(
        db: Database,
        cache: Arc<dyn CacheStore>,
        router: Arc<Router<GatewayContext>>,
        settings: GatewaySettings,
    ) -> Self {
        let resolver = ConfigResolver::new(Arc::new(db.clone()), cache)
            .with_constants(settings.fallback)
            .with_ttl(settings.cache_ttl);

        GatewayContext {
            db,
            resolver,
            router,
            settings: Arc::new(settings),
        }
    }

    /// Builds a context with every cell registered.
    pub fn bootstrap(
        db: Database,
        cache: Arc<dyn CacheStore>,
        settings: GatewaySettings,
    ) -> Result<Self, RegistrationError> {
        let router = cells::router()?;
        Ok(GatewayContext::new(db, cache, Arc::new(router), settings))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        self.resolver.cache()
    }

    pub fn router(&self) -> &Router<GatewayContext> {
        &self.router
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Invokes a destination with this context.
    pub async fn dispatch(&self, destination: &Destination, payload: Payload, channel: Channel) -> GatewayResult<Value> {
        self.router.invoke(self.clone(), destination, payload, channel).await
    }

    /// Cell-to-cell call.
    pub async fn call(&self, cell: CellId, action: &str, payload: Payload) -> GatewayResult<Value> {
        self.dispatch(&Destination::new(cell, action), payload, Channel::Internal)
            .await
    }
}
