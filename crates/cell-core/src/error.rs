//! # Error Types
//!
//! Errors raised before any computation or I/O happens.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Error Type Per Layer                          │
//! │                                                                         │
//! │  cell-core errors (this file)                                          │
//! │  ├── CoreError        - Calculator failures                            │
//! │  └── ValidationError  - Bad payload field                              │
//! │                                                                         │
//! │  cell-db errors (separate crate)                                       │
//! │  └── DbError          - SQLite and constraint failures                 │
//! │                                                                         │
//! │  cell-gateway errors                                                   │
//! │  └── GatewayError     - What the router and cells return               │
//! │                                                                         │
//! │  gateway-api errors                                                    │
//! │  └── ApiError         - What HTTP callers see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → GatewayError → ApiError → HTTP 4xx            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Calculator errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation before any computation ran.
    ///
    /// ## When This Occurs
    /// - Negative amount
    /// - Base rate outside `[0, 1]`
    /// - Tenant identifier missing
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A payload field that cannot be used as given.
///
/// `field` is the payload key (`tenantId`, `baseRate`), so the message can be
/// shown to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Missing, or blank after trimming.
    #[error("{field} is required")]
    Required { field: String },

    /// Longer than `max` characters.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Outside an inclusive range.
    ///
    /// Bounds are kept as text so decimal ranges (`0` to `1`) and integer
    /// ranges (`0` to `10000`) share one variant.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., bad tenant id or region code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Not one of the accepted spellings.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate group name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates a `Required` error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates an `InvalidFormat` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `OutOfRange` error.
    pub fn out_of_range(
        field: impl Into<String>,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Result of calculator operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_field() {
        let err = ValidationError::required("tenantId");
        assert_eq!(err.to_string(), "tenantId is required");

        let err = ValidationError::out_of_range("baseRate", 0, 1);
        assert_eq!(err.to_string(), "baseRate must be between 0 and 1");

        let err = ValidationError::Negative {
            field: "amount".to_string(),
        };
        assert_eq!(err.to_string(), "amount must not be negative");
    }

    #[test]
    fn test_validation_becomes_invalid_input() {
        let core_err: CoreError = ValidationError::required("amount").into();
        assert!(matches!(core_err, CoreError::InvalidInput(_)));
        assert_eq!(core_err.to_string(), "Invalid input: amount is required");
    }
}
