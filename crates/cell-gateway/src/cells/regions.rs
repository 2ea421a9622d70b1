//! `config/regions`: what applies to a region by default.

use serde::Deserialize;
use serde_json::{json, Value};

use cell_core::validation::validate_region_code;
use cell_core::LookupKey;

use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder.register(CellId::ConfigRegions, "defaults", defaults)
}

#[derive(Debug, Deserialize)]
struct DefaultsInput {
    region: String,
}

/// `{region}` → `{region, currency, multiplier, multiplierSource}`.
async fn defaults(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: DefaultsInput = payload.parse()?;
    validate_region_code(&input.region)?;

    let key = LookupKey::region(&input.region);
    let resolution = ctx.resolver().resolve(&tenant, &key).await;
    let multiplier = resolution
        .value
        .as_multiplier()
        .unwrap_or(ctx.resolver().constants().region_multiplier);

    let code = key.key_text();

    Ok(json!({
        "region": code,
        "currency": ctx.settings().currency_for(&code),
        "multiplier": multiplier,
        "multiplierSource": resolution.source,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::cells::testing::invoke;
    use crate::context::GatewaySettings;
    use cell_db::{Database, DbConfig};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_defaults_use_configured_currency() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = GatewaySettings {
            default_currency: "USD".to_string(),
            region_currencies: HashMap::from([("NG".to_string(), "NGN".to_string())]),
            ..GatewaySettings::default()
        };
        let ctx = GatewayContext::bootstrap(db, Arc::new(MemoryCache::new()), settings).unwrap();

        let ng = invoke(&ctx, CellId::ConfigRegions, "defaults", json!({ "tenantId": "t1", "region": "ng" }))
            .await
            .unwrap();
        assert_eq!(ng["region"], "NG");
        assert_eq!(ng["currency"], "NGN");
        assert_eq!(ng["multiplierSource"], "fallback");

        let other = invoke(&ctx, CellId::ConfigRegions, "defaults", json!({ "tenantId": "t1", "region": "FR" }))
            .await
            .unwrap();
        assert_eq!(other["currency"], "USD");
    }
}
