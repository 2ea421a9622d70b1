//! # Validation Module
//!
//! Input validation utilities for the Cell Gateway.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (axum)                                                   │
//! │  └── Body must be a JSON object                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Cell handler (Rust)                                          │
//! │  ├── Type validation (payload deserialization)                         │
//! │  └── THIS MODULE: business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints                                                 │
//! │  └── UNIQUE / partial unique indexes                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::{MAX_MULTIPLIER, MAX_TENANT_ID_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound on amounts, keeping every product well inside `Decimal` range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Discounts are stored in basis points (10000 = 100%).
pub const MAX_DISCOUNT_BPS: i64 = 10_000;

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a tenant identifier.
///
/// ## Rules
/// - Must not be blank
/// - At most 64 characters
/// - Letters, digits, hyphens and underscores only
pub fn validate_tenant_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::required("tenantId"));
    }

    if id.len() > MAX_TENANT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "tenantId".to_string(),
            max: MAX_TENANT_ID_LEN,
        });
    }

    if !id.chars().all(is_identifier_char) {
        return Err(ValidationError::invalid(
            "tenantId",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a region code (`NG`, `US_CA`).
pub fn validate_region_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("region"));
    }

    if code.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "region".to_string(),
            max: 32,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::invalid(
            "region",
            "must contain only letters, numbers, and underscores",
        ));
    }

    Ok(())
}

/// Validates an item type name (`product`, `digital_service`).
pub fn validate_item_type(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("itemType"));
    }

    if name.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "itemType".to_string(),
            max: 64,
        });
    }

    if !name.chars().all(is_identifier_char) {
        return Err(ValidationError::invalid(
            "itemType",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a router action name.
///
/// ## Rules
/// - Starts with a lowercase ASCII letter
/// - Letters and digits only (`calculate`, `upsertRegion`)
pub fn validate_action_name(action: &str) -> ValidationResult<()> {
    let mut chars = action.chars();

    match chars.next() {
        None => Err(ValidationError::required("action")),
        Some(first) if !first.is_ascii_lowercase() => Err(ValidationError::invalid(
            "action",
            "must start with a lowercase letter",
        )),
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric()) => Err(ValidationError::invalid(
            "action",
            "must contain only letters and digits",
        )),
        Some(_) => Ok(()),
    }
}

/// Validates a display name (group names and similar).
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a taxable amount.
///
/// ## Rules
/// - Must be non-negative (zero is allowed)
/// - Must not exceed [`MAX_AMOUNT`]
pub fn validate_amount(amount: Decimal) -> ValidationResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::Negative {
            field: "amount".to_string(),
        });
    }

    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(ValidationError::out_of_range("amount", 0, MAX_AMOUNT));
    }

    Ok(())
}

/// Validates a base tax rate (a fraction in `[0, 1]`).
///
/// ## Example
/// ```rust
/// use cell_core::validation::validate_base_rate;
/// use rust_decimal::Decimal;
///
/// assert!(validate_base_rate(Decimal::new(75, 3)).is_ok());  // 0.075
/// assert!(validate_base_rate(Decimal::new(15, 1)).is_err()); // 1.5
/// ```
pub fn validate_base_rate(rate: Decimal) -> ValidationResult<()> {
    validate_fraction("baseRate", rate)
}

/// Validates a fraction in `[0, 1]` for the named field.
pub fn validate_fraction(field: &str, value: Decimal) -> ValidationResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(ValidationError::out_of_range(field, 0, 1));
    }

    Ok(())
}

/// Validates a region or item type multiplier.
///
/// ## Rules
/// - Between 0 and [`MAX_MULTIPLIER`] inclusive
pub fn validate_multiplier(multiplier: Decimal) -> ValidationResult<()> {
    if multiplier < Decimal::ZERO || multiplier > Decimal::from(MAX_MULTIPLIER) {
        return Err(ValidationError::out_of_range("multiplier", 0, MAX_MULTIPLIER));
    }

    Ok(())
}

/// Validates a fee tier row.
///
/// ## Rules
/// - `minAmount >= 0`
/// - `maxAmount`, when present, is greater than `minAmount`
/// - Exactly one of `percentage` (a fraction) or `flatFee` (non-negative)
pub fn validate_fee_tier(
    min_amount: Decimal,
    max_amount: Option<Decimal>,
    percentage: Option<Decimal>,
    flat_fee: Option<Decimal>,
) -> ValidationResult<()> {
    if min_amount.is_sign_negative() && !min_amount.is_zero() {
        return Err(ValidationError::Negative {
            field: "minAmount".to_string(),
        });
    }

    if let Some(max) = max_amount {
        if max <= min_amount {
            return Err(ValidationError::invalid(
                "maxAmount",
                "must be greater than minAmount",
            ));
        }
    }

    match (percentage, flat_fee) {
        (Some(rate), None) => validate_fraction("percentage", rate),
        (None, Some(fee)) if fee.is_sign_negative() && !fee.is_zero() => {
            Err(ValidationError::Negative {
                field: "flatFee".to_string(),
            })
        }
        (None, Some(_)) => Ok(()),
        _ => Err(ValidationError::invalid(
            "fee",
            "exactly one of percentage or flatFee must be set",
        )),
    }
}

/// Validates a discount in basis points.
pub fn validate_discount_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=MAX_DISCOUNT_BPS).contains(&bps) {
        return Err(ValidationError::out_of_range(
            "discountBps",
            0,
            MAX_DISCOUNT_BPS,
        ));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_tenant_id() {
        assert!(validate_tenant_id("t1").is_ok());
        assert!(validate_tenant_id("acme_corp-01").is_ok());

        assert!(validate_tenant_id("").is_err());
        assert!(validate_tenant_id("   ").is_err());
        assert!(validate_tenant_id("has space").is_err());
        assert!(validate_tenant_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_region_and_item_type() {
        assert!(validate_region_code("NG").is_ok());
        assert!(validate_region_code("US_CA").is_ok());
        assert!(validate_region_code("").is_err());
        assert!(validate_region_code("N-G").is_err());

        assert!(validate_item_type("product").is_ok());
        assert!(validate_item_type("digital-service").is_ok());
        assert!(validate_item_type("a b").is_err());
    }

    #[test]
    fn test_validate_action_name() {
        assert!(validate_action_name("calculate").is_ok());
        assert!(validate_action_name("upsertRegion").is_ok());

        assert!(validate_action_name("").is_err());
        assert!(validate_action_name("Calculate").is_err());
        assert!(validate_action_name("add-member").is_err());
        assert!(validate_action_name("1st").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec!(0)).is_ok());
        assert!(validate_amount(dec!(1000)).is_ok());
        assert!(validate_amount(dec!(-0.01)).is_err());
        assert!(validate_amount(Decimal::from(MAX_AMOUNT) + dec!(1)).is_err());
    }

    #[test]
    fn test_validate_base_rate() {
        assert!(validate_base_rate(dec!(0)).is_ok());
        assert!(validate_base_rate(dec!(0.075)).is_ok());
        assert!(validate_base_rate(dec!(1)).is_ok());

        assert!(validate_base_rate(dec!(-0.01)).is_err());
        assert!(validate_base_rate(dec!(1.01)).is_err());
    }

    #[test]
    fn test_validate_multiplier() {
        assert!(validate_multiplier(dec!(1)).is_ok());
        assert!(validate_multiplier(dec!(0)).is_ok());
        assert!(validate_multiplier(dec!(10)).is_ok());
        assert!(validate_multiplier(dec!(-1)).is_err());
        assert!(validate_multiplier(dec!(150)).is_err());
    }

    #[test]
    fn test_validate_fee_tier() {
        assert!(validate_fee_tier(dec!(0), Some(dec!(100)), None, Some(dec!(5))).is_ok());
        assert!(validate_fee_tier(dec!(100), None, Some(dec!(0.015)), None).is_ok());

        // Bounds out of order
        assert!(validate_fee_tier(dec!(100), Some(dec!(100)), None, Some(dec!(5))).is_err());
        // Neither / both fee kinds
        assert!(validate_fee_tier(dec!(0), None, None, None).is_err());
        assert!(validate_fee_tier(dec!(0), None, Some(dec!(0.01)), Some(dec!(5))).is_err());
        // Percentage above 100%
        assert!(validate_fee_tier(dec!(0), None, Some(dec!(2)), None).is_err());
        // Negative flat fee
        assert!(validate_fee_tier(dec!(0), None, None, Some(dec!(-1))).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(0).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
        assert!(validate_discount_bps(-1).is_err());
    }
}
