//! # `config/multipliers`
//!
//! Administration of a tenant's configuration rows.
//!
//! | Action           | Input                                         |
//! |------------------|-----------------------------------------------|
//! | `list`           | -                                             |
//! | `upsertRegion`   | `regionCode, multiplier, isDefault?`          |
//! | `upsertItemType` | `itemType, multiplier, isDefault?`            |
//! | `upsertFeeTier`  | `minAmount, maxAmount?, percentage?, flatFee?, isDefault?` |
//! | `deactivate`     | `kind, id`                                    |
//!
//! Every write drops the cache entries it could have made stale, so the
//! next resolution reads the store.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use cell_core::validation::{validate_item_type, validate_multiplier, validate_region_code};
use cell_core::{ConfigKind, LookupKey, TenantId};
use cell_db::{MultiplierEntry, MultiplierTable, NewFeeTier};

use super::{actor_id, audit};
use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder
        .register(CellId::ConfigMultipliers, "list", list)?
        .register(CellId::ConfigMultipliers, "upsertRegion", upsert_region)?
        .register(CellId::ConfigMultipliers, "upsertItemType", upsert_item_type)?
        .register(CellId::ConfigMultipliers, "upsertFeeTier", upsert_fee_tier)?
        .register(CellId::ConfigMultipliers, "deactivate", deactivate)
}

async fn list(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let repo = ctx.db().config();

    let regions = repo.list_multipliers(MultiplierTable::Region, &tenant).await?;
    let item_types = repo.list_multipliers(MultiplierTable::ItemType, &tenant).await?;
    let fee_tiers = repo.list_fee_tiers(&tenant).await?;

    Ok(json!({
        "regions": regions,
        "itemTypes": item_types,
        "feeTiers": fee_tiers,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionInput {
    region_code: String,
    multiplier: Decimal,
    #[serde(default)]
    is_default: bool,
}

async fn upsert_region(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: RegionInput = payload.parse()?;

    validate_region_code(&input.region_code)?;
    validate_multiplier(input.multiplier)?;

    let key = LookupKey::region(&input.region_code);
    let entry = upsert(&ctx, &tenant, MultiplierTable::Region, key, input.multiplier, input.is_default).await?;

    audit(&tenant, actor_id(&payload), "region_multiplier", &entry.id, "upsert");
    Ok(serde_json::to_value(entry)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemTypeInput {
    item_type: String,
    multiplier: Decimal,
    #[serde(default)]
    is_default: bool,
}

async fn upsert_item_type(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: ItemTypeInput = payload.parse()?;

    validate_item_type(&input.item_type)?;
    validate_multiplier(input.multiplier)?;

    let key = LookupKey::item_type(&input.item_type);
    let entry = upsert(&ctx, &tenant, MultiplierTable::ItemType, key, input.multiplier, input.is_default).await?;

    audit(&tenant, actor_id(&payload), "item_type_multiplier", &entry.id, "upsert");
    Ok(serde_json::to_value(entry)?)
}

async fn upsert(
    ctx: &GatewayContext,
    tenant: &TenantId,
    table: MultiplierTable,
    key: LookupKey,
    multiplier: Decimal,
    is_default: bool,
) -> GatewayResult<MultiplierEntry> {
    let entry = ctx
        .db()
        .config()
        .upsert_multiplier(table, tenant, &key.key_text(), multiplier, is_default)
        .await?;

    ctx.resolver().invalidate(tenant, &key).await;
    Ok(entry)
}

async fn upsert_fee_tier(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: NewFeeTier = payload.parse()?;
    input.validate()?;

    let entry = ctx.db().config().upsert_fee_tier(&tenant, &input).await?;
    ctx.resolver().invalidate_kind(&tenant, ConfigKind::FeeTier).await;

    audit(&tenant, actor_id(&payload), "fee_tier", &entry.id, "upsert");
    Ok(serde_json::to_value(entry)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeactivateInput {
    kind: ConfigKind,
    id: String,
}

async fn deactivate(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: DeactivateInput = payload.parse()?;
    let repo = ctx.db().config();

    let result = match MultiplierTable::for_kind(input.kind) {
        Some(table) => {
            let entry = repo.deactivate_multiplier(table, &tenant, &input.id).await?;
            let key = match table {
                MultiplierTable::Region => LookupKey::region(&entry.key),
                MultiplierTable::ItemType => LookupKey::item_type(&entry.key),
            };
            ctx.resolver().invalidate(&tenant, &key).await;
            serde_json::to_value(entry)?
        }
        None => {
            let entry = repo.deactivate_fee_tier(&tenant, &input.id).await?;
            ctx.resolver().invalidate_kind(&tenant, ConfigKind::FeeTier).await;
            serde_json::to_value(entry)?
        }
    };

    audit(&tenant, actor_id(&payload), input.kind.as_str(), &input.id, "deactivate");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::testing::{context, invoke};
    use crate::error::GatewayError;
    use cell_core::ConfigSource;
    use rust_decimal_macros::dec;

    fn tenant() -> TenantId {
        TenantId::parse("t1").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_region_refreshes_cached_value() {
        let ctx = context().await;
        let key = LookupKey::region("NG");

        invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "upsertRegion",
            json!({ "tenantId": "t1", "regionCode": "ng", "multiplier": 1.1 }),
        )
        .await
        .unwrap();
        assert_eq!(ctx.resolver().resolve(&tenant(), &key).await.source, ConfigSource::Stored);
        assert_eq!(ctx.resolver().resolve(&tenant(), &key).await.source, ConfigSource::Cached);

        invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "upsertRegion",
            json!({ "tenantId": "t1", "regionCode": "NG", "multiplier": 1.4 }),
        )
        .await
        .unwrap();

        let fresh = ctx.resolver().resolve(&tenant(), &key).await;
        assert_eq!(fresh.source, ConfigSource::Stored);
        assert_eq!(fresh.value.as_multiplier(), Some(dec!(1.4)));
    }

    #[tokio::test]
    async fn test_upsert_validates_input() {
        let ctx = context().await;

        let negative = invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "upsertItemType",
            json!({ "tenantId": "t1", "itemType": "food", "multiplier": -1 }),
        )
        .await
        .unwrap_err();
        assert!(matches!(negative.root(), GatewayError::Validation(_)));

        let both_fees = invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "upsertFeeTier",
            json!({ "tenantId": "t1", "minAmount": 0, "percentage": 0.01, "flatFee": 5 }),
        )
        .await
        .unwrap_err();
        assert!(matches!(both_fees.root(), GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fee_tier_write_clears_cached_amounts() {
        let ctx = context().await;
        let key = LookupKey::fee_tier(dec!(500));

        ctx.resolver().resolve(&tenant(), &key).await;
        invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "upsertFeeTier",
            json!({ "tenantId": "t1", "minAmount": 0, "maxAmount": 1000, "flatFee": 50 }),
        )
        .await
        .unwrap();

        // Fallback results are never cached, but the stored one is
        let resolution = ctx.resolver().resolve(&tenant(), &key).await;
        assert_eq!(resolution.source, ConfigSource::Stored);
        assert_eq!(ctx.resolver().resolve(&tenant(), &key).await.source, ConfigSource::Cached);

        let tiers = invoke(&ctx, CellId::ConfigMultipliers, "list", json!({ "tenantId": "t1" }))
            .await
            .unwrap();
        let id = tiers["feeTiers"][0]["id"].as_str().unwrap().to_string();

        invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "deactivate",
            json!({ "tenantId": "t1", "kind": "feeTier", "id": id }),
        )
        .await
        .unwrap();

        let after = ctx.resolver().resolve(&tenant(), &key).await;
        assert_eq!(after.source, ConfigSource::Fallback);
    }

    #[tokio::test]
    async fn test_deactivate_unknown_row_is_not_found() {
        let ctx = context().await;

        let err = invoke(
            &ctx,
            CellId::ConfigMultipliers,
            "deactivate",
            json!({ "tenantId": "t1", "kind": "region", "id": "missing" }),
        )
        .await
        .unwrap_err();

        assert!(matches!(err.root(), GatewayError::NotFound { .. }));
    }
}
