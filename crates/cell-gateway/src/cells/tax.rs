//! `tax/calculator`: quotes and configuration diagnostics.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use cell_core::calculator::TaxRequest;
use cell_core::validation::{validate_amount, validate_item_type, validate_region_code};
use cell_core::{ConfigKind, LookupKey, ValidationError};

use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};
use crate::tax;

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder
        .register(CellId::TaxCalculator, "calculate", calculate)?
        .register(CellId::TaxCalculator, "resolve", resolve)
}

/// `{amount, baseRate, region, itemType, tenantId}` → quote.
async fn calculate(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let request: TaxRequest = payload.parse()?;
    let quote = tax::quote(ctx.resolver(), &request).await?;

    Ok(serde_json::to_value(quote)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveInput {
    kind: ConfigKind,
    key: Value,
}

/// `{kind, key}` → the resolution for one lookup key.
async fn resolve(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: ResolveInput = payload.parse()?;
    let key = lookup_key(input.kind, &input.key)?;

    let resolution = ctx.resolver().resolve(&tenant, &key).await;

    Ok(json!({
        "key": key.to_string(),
        "value": resolution.value,
        "source": resolution.source,
    }))
}

fn lookup_key(kind: ConfigKind, raw: &Value) -> GatewayResult<LookupKey> {
    let key = match kind {
        ConfigKind::Region => {
            let code = raw.as_str().ok_or_else(|| ValidationError::required("key"))?;
            validate_region_code(code)?;
            LookupKey::region(code)
        }
        ConfigKind::ItemType => {
            let name = raw.as_str().ok_or_else(|| ValidationError::required("key"))?;
            validate_item_type(name)?;
            LookupKey::item_type(name)
        }
        ConfigKind::FeeTier => {
            let amount: Decimal = serde_json::from_value(raw.clone())
                .map_err(|_| ValidationError::invalid("key", "must be an amount"))?;
            validate_amount(amount)?;
            LookupKey::fee_tier(amount)
        }
    };

    Ok(key)
}
