//! # Tax Quotes
//!
//! Resolves the three adjustments a quote needs, then hands the arithmetic
//! to `cell_core::calculator`.
//!
//! ```text
//! TaxRequest ──validate──► tenant
//!      │
//!      ├── resolve Region(region)          ┐
//!      ├── resolve ItemType(item_type)     ├─ concurrently
//!      └── resolve FeeTier(amount)         ┘
//!      │
//!      ├── every lookup ErrorFallback ──► emergency_quote (base rate only)
//!      └── otherwise ──────────────────► compute_quote
//! ```

use tracing::warn;

use cell_core::calculator::{compute_quote, emergency_quote, Adjustments, LookupSources, TaxQuote, TaxRequest};
use cell_core::LookupKey;

use crate::error::GatewayResult;
use crate::resolver::ConfigResolver;

/// Computes a quote with tenant configuration applied.
///
/// ## Returns
/// * `Ok(TaxQuote)` - Always, once the request is valid
/// * `Err(GatewayError::Validation)` - Negative amount, rate outside
///   `[0, 1]`, missing tenant, malformed region or item type
pub async fn quote(resolver: &ConfigResolver, request: &TaxRequest) -> GatewayResult<TaxQuote> {
    let tenant = request.validate()?;

    let region_key = LookupKey::region(&request.region);
    let item_key = LookupKey::item_type(&request.item_type);
    let fee_key = LookupKey::fee_tier(request.amount);

    let (region, item_type, fee) = tokio::join!(
        resolver.resolve(&tenant, &region_key),
        resolver.resolve(&tenant, &item_key),
        resolver.resolve(&tenant, &fee_key),
    );

    let sources = LookupSources {
        region: region.source,
        item_type: item_type.source,
        fee: fee.source,
    };

    if sources.all_failed() {
        warn!(tenant = %tenant, "All configuration lookups failed, using emergency quote");
        return Ok(emergency_quote(request.amount, request.base_rate).with_sources(sources));
    }

    let constants = resolver.constants();
    let adjustments = Adjustments {
        region_multiplier: region.value.as_multiplier().unwrap_or(constants.region_multiplier),
        item_type_multiplier: item_type
            .value
            .as_multiplier()
            .unwrap_or(constants.item_type_multiplier),
        fee_rule: fee.value.as_fee_rule().unwrap_or(constants.fee_rule),
    };

    Ok(compute_quote(request.amount, request.base_rate, &adjustments).with_sources(sources))
}
