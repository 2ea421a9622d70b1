//! # Domain Types
//!
//! Core domain types used throughout the Cell Gateway.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TenantId     │   │    LookupKey    │   │   ConfigValue   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  isolation      │   │  Region(NG)     │   │  Multiplier     │       │
//! │  │  boundary       │   │  ItemType(...)  │   │  Fee(FeeRule)   │       │
//! │  │                 │   │  FeeTier(amt)   │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Resolution    │   │  ConfigSource   │   │    FeeTier      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  value          │   │  Cached         │   │  [min, max)     │       │
//! │  │  source         │   │  Stored         │   │  FeeRule        │       │
//! │  └─────────────────┘   │  StoredDefault  │   └─────────────────┘       │
//! │                        │  Fallback       │                              │
//! │                        │  ErrorFallback  │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::validation::{self, ValidationResult};

// =============================================================================
// Tenant
// =============================================================================

/// Tenant identifier: the isolation boundary for all configuration and
/// business data.
///
/// Only constructed through [`TenantId::parse`], so a `TenantId` in hand is
/// always non-blank and well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parses and validates a tenant identifier.
    ///
    /// ## Example
    /// ```rust
    /// use cell_core::TenantId;
    ///
    /// assert!(TenantId::parse("t1").is_ok());
    /// assert!(TenantId::parse("  ").is_err());
    /// ```
    pub fn parse(raw: &str) -> ValidationResult<Self> {
        let trimmed = raw.trim();
        validation::validate_tenant_id(trimmed)?;
        Ok(TenantId(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = crate::error::ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TenantId::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

// =============================================================================
// Configuration Source
// =============================================================================

/// Where a resolved configuration value came from.
///
/// ## Precedence
/// The resolver walks these top to bottom and stops at the first hit:
/// ```text
/// Cached ──► Stored ──► StoredDefault ──► Fallback
///                 (any store failure) ──► ErrorFallback
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum ConfigSource {
    /// Unexpired cache entry.
    Cached,
    /// Tenant-scoped exact-match row.
    Stored,
    /// Tenant-scoped default row.
    StoredDefault,
    /// Process-wide constant.
    Fallback,
    /// Process-wide constant used because the store failed.
    ErrorFallback,
}

impl ConfigSource {
    /// True for the two process-constant sources.
    pub fn is_fallback(&self) -> bool {
        matches!(self, ConfigSource::Fallback | ConfigSource::ErrorFallback)
    }
}

// =============================================================================
// Lookup Keys
// =============================================================================

/// The configuration table a lookup key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKind {
    Region,
    ItemType,
    FeeTier,
}

impl ConfigKind {
    /// Stable name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::Region => "region",
            ConfigKind::ItemType => "item_type",
            ConfigKind::FeeTier => "fee_tier",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key for one configuration lookup within a tenant.
///
/// Use the constructors: they normalise input so `" ng"` and `"NG"` share a
/// row and a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "camelCase")]
pub enum LookupKey {
    /// Region multiplier, keyed by upper-cased region code.
    Region(String),
    /// Item type multiplier, keyed by lower-cased item type.
    ItemType(String),
    /// Fee tier containing the given amount.
    FeeTier(Decimal),
}

impl LookupKey {
    /// Region lookup (`" ng "` → `NG`).
    pub fn region(code: &str) -> Self {
        LookupKey::Region(code.trim().to_uppercase())
    }

    /// Item type lookup (`"Product"` → `product`).
    pub fn item_type(name: &str) -> Self {
        LookupKey::ItemType(name.trim().to_lowercase())
    }

    /// Fee tier lookup for an amount (normalised so `1000` and `1000.00`
    /// share a cache entry).
    pub fn fee_tier(amount: Decimal) -> Self {
        LookupKey::FeeTier(amount.normalize())
    }

    /// Which table this key addresses.
    pub fn kind(&self) -> ConfigKind {
        match self {
            LookupKey::Region(_) => ConfigKind::Region,
            LookupKey::ItemType(_) => ConfigKind::ItemType,
            LookupKey::FeeTier(_) => ConfigKind::FeeTier,
        }
    }

    /// Cache key for this lookup within a tenant.
    ///
    /// ## Format
    /// `cell:cfg:{tenant}:{kind}:{key}`, e.g. `cell:cfg:t1:region:NG`
    pub fn cache_key(&self, tenant: &TenantId) -> String {
        format!("cell:cfg:{}:{}:{}", tenant, self.kind(), self.key_text())
    }

    /// Cache key prefix covering every entry of one kind for a tenant.
    pub fn cache_prefix(tenant: &TenantId, kind: ConfigKind) -> String {
        format!("cell:cfg:{}:{}:", tenant, kind)
    }

    /// The normalised key alone (`NG`, `product`, `1000`).
    pub fn key_text(&self) -> String {
        match self {
            LookupKey::Region(code) => code.clone(),
            LookupKey::ItemType(name) => name.clone(),
            LookupKey::FeeTier(amount) => amount.to_string(),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key_text())
    }
}

// =============================================================================
// Fee Rules and Tiers
// =============================================================================

/// How the fee of one tier is computed.
///
/// A percentage wins over a flat fee when both are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FeeRule {
    /// Fraction of the amount (0.015 = 1.5%).
    #[ts(type = "number | null")]
    pub percentage: Option<Decimal>,

    /// Fixed fee in currency units.
    #[ts(type = "number | null")]
    pub flat_fee: Option<Decimal>,
}

impl FeeRule {
    /// A percentage-of-amount rule.
    pub fn percentage(rate: Decimal) -> Self {
        FeeRule {
            percentage: Some(rate),
            flat_fee: None,
        }
    }

    /// A flat fee rule.
    pub fn flat(fee: Decimal) -> Self {
        FeeRule {
            percentage: None,
            flat_fee: Some(fee),
        }
    }

    /// Computes the fee for an amount, rounded to 2 dp.
    pub fn fee_for(&self, amount: Money) -> Money {
        match (self.percentage, self.flat_fee) {
            (Some(rate), _) => amount.apply_rate(rate),
            (None, Some(flat)) => Money::round(flat),
            (None, None) => Money::zero(),
        }
    }
}

/// One row of a tenant's fee tier table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeTier {
    /// Inclusive lower bound.
    pub min_amount: Decimal,
    /// Exclusive upper bound; `None` means open-ended.
    pub max_amount: Option<Decimal>,
    /// Fee computation for amounts in range.
    pub rule: FeeRule,
}

impl FeeTier {
    /// Returns true if `amount` falls in `[min_amount, max_amount)`.
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount < max)
    }
}

// =============================================================================
// Configuration Values
// =============================================================================

/// A resolved configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ConfigValue {
    /// Region or item type multiplier.
    Multiplier(Decimal),
    /// Fee rule of the matching tier.
    Fee(FeeRule),
}

impl ConfigValue {
    /// Returns the multiplier, if this is one.
    pub fn as_multiplier(&self) -> Option<Decimal> {
        match self {
            ConfigValue::Multiplier(m) => Some(*m),
            ConfigValue::Fee(_) => None,
        }
    }

    /// Returns the fee rule, if this is one.
    pub fn as_fee_rule(&self) -> Option<FeeRule> {
        match self {
            ConfigValue::Fee(rule) => Some(*rule),
            ConfigValue::Multiplier(_) => None,
        }
    }
}

/// The result of one configuration lookup: always a value, never absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub value: ConfigValue,
    pub source: ConfigSource,
}

impl Resolution {
    pub fn new(value: ConfigValue, source: ConfigSource) -> Self {
        Resolution { value, source }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
