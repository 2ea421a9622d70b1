//! # Tax and Fee Calculator
//!
//! Pure composition of resolved configuration values into a monetary quote.
//! Lookups happen elsewhere (the resolver in `cell-gateway`); this module only
//! does arithmetic, so every function here is deterministic.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal            = round2(amount)                                   │
//! │  base_tax            = round2(subtotal × baseRate)                      │
//! │  regional_adjustment = round2(subtotal × baseRate × (regionMult − 1))   │
//! │  tax                 = round2((base_tax + regional_adj) × itemTypeMult) │
//! │  fee                 = first tier containing amount:                    │
//! │                          percentage? round2(subtotal × pct) : flat      │
//! │  total               = subtotal + tax + fee          (exact)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every intermediate is rounded where it is produced, not at the end.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{ConfigSource, FeeRule, FeeTier, TenantId};
use crate::validation::{self, ValidationResult};
use crate::ValidationError;

// =============================================================================
// Request
// =============================================================================

/// Input of a tax calculation, as it arrives in a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRequest {
    pub amount: Decimal,
    pub base_rate: Decimal,
    pub region: String,
    pub item_type: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl TaxRequest {
    /// Validates the request and returns its tenant.
    ///
    /// ## Rules
    /// - `amount >= 0`
    /// - `0 <= baseRate <= 1`
    /// - `tenantId` present and well-formed
    /// - `region` and `itemType` well-formed
    pub fn validate(&self) -> ValidationResult<TenantId> {
        validation::validate_amount(self.amount)?;
        validation::validate_base_rate(self.base_rate)?;

        let tenant = match self.tenant_id.as_deref() {
            Some(raw) => TenantId::parse(raw)?,
            None => return Err(ValidationError::required("tenantId")),
        };

        validation::validate_region_code(&self.region)?;
        validation::validate_item_type(&self.item_type)?;

        Ok(tenant)
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Where the quote's adjustments came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum QuoteSource {
    /// Adjustments came through the resolver chain.
    Resolved,
    /// Every lookup failed; only the base rate was applied.
    EmergencyFallback,
}

/// Per-lookup provenance of the adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LookupSources {
    pub region: ConfigSource,
    pub item_type: ConfigSource,
    pub fee: ConfigSource,
}

impl LookupSources {
    /// True when every lookup degraded because the store failed.
    pub fn all_failed(&self) -> bool {
        [self.region, self.item_type, self.fee]
            .iter()
            .all(|s| *s == ConfigSource::ErrorFallback)
    }
}

/// How the tax figure was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxBreakdown {
    #[ts(type = "number")]
    pub base_tax: Money,
    #[ts(type = "number")]
    pub regional_adjustment: Money,
    #[ts(type = "number")]
    pub region_multiplier: Decimal,
    #[ts(type = "number")]
    pub item_type_multiplier: Decimal,
    pub fee_rule: FeeRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub sources: Option<LookupSources>,
}

/// Result of a tax calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TaxQuote {
    #[ts(type = "number")]
    pub subtotal: Money,
    #[ts(type = "number")]
    pub tax: Money,
    #[ts(type = "number")]
    pub fee: Money,
    #[ts(type = "number")]
    pub total: Money,
    pub breakdown: TaxBreakdown,
    pub source: QuoteSource,
}

impl TaxQuote {
    /// Attaches lookup provenance to the breakdown.
    pub fn with_sources(mut self, sources: LookupSources) -> Self {
        self.breakdown.sources = Some(sources);
        self
    }
}

// =============================================================================
// Adjustments
// =============================================================================

/// Resolved configuration values a quote is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustments {
    pub region_multiplier: Decimal,
    pub item_type_multiplier: Decimal,
    pub fee_rule: FeeRule,
}

impl Adjustments {
    /// No regional or item adjustment, no fee.
    pub fn neutral() -> Self {
        Adjustments {
            region_multiplier: Decimal::ONE,
            item_type_multiplier: Decimal::ONE,
            fee_rule: FeeRule::default(),
        }
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Computes a quote. Inputs are assumed validated.
///
/// ## Example
/// ```rust
/// use cell_core::calculator::{compute_quote, Adjustments};
/// use cell_core::FeeRule;
/// use rust_decimal::Decimal;
///
/// let adjustments = Adjustments {
///     region_multiplier: Decimal::new(12, 1),    // 1.2
///     item_type_multiplier: Decimal::ONE,
///     fee_rule: FeeRule::flat(Decimal::from(5)),
/// };
/// let quote = compute_quote(Decimal::from(1000), Decimal::new(75, 3), &adjustments);
///
/// // 75.00 base + 15.00 regional
/// assert_eq!(quote.tax.amount(), Decimal::from(90));
/// assert_eq!(quote.total.amount(), Decimal::from(1095));
/// ```
pub fn compute_quote(amount: Decimal, base_rate: Decimal, adjustments: &Adjustments) -> TaxQuote {
    let subtotal = Money::round(amount);

    let base_tax = subtotal.apply_rate(base_rate);
    let regional_adjustment =
        Money::round(subtotal.amount() * base_rate * (adjustments.region_multiplier - Decimal::ONE));
    let tax = (base_tax + regional_adjustment).apply_rate(adjustments.item_type_multiplier);

    let fee = adjustments.fee_rule.fee_for(subtotal);
    let total = subtotal + tax + fee;

    TaxQuote {
        subtotal,
        tax,
        fee,
        total,
        breakdown: TaxBreakdown {
            base_tax,
            regional_adjustment,
            region_multiplier: adjustments.region_multiplier,
            item_type_multiplier: adjustments.item_type_multiplier,
            fee_rule: adjustments.fee_rule,
            sources: None,
        },
        source: QuoteSource::Resolved,
    }
}

/// Computes a quote from the base rate alone, for when configuration could
/// not be read at all.
pub fn emergency_quote(amount: Decimal, base_rate: Decimal) -> TaxQuote {
    TaxQuote {
        source: QuoteSource::EmergencyFallback,
        ..compute_quote(amount, base_rate, &Adjustments::neutral())
    }
}

/// Picks the fee tier for an amount.
///
/// Tiers are ordered ascending by lower bound and the first one whose range
/// contains `amount` wins, so overlapping rows resolve deterministically.
pub fn select_fee_tier(tiers: &[FeeTier], amount: Decimal) -> Option<&FeeTier> {
    let mut ordered: Vec<&FeeTier> = tiers.iter().collect();
    ordered.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
    ordered.into_iter().find(|tier| tier.contains(amount))
}

// =============================================================================
// Unit Tests
// =============================================================================
