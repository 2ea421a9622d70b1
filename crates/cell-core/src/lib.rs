//! # cell-core: Pure Logic for the Cell Gateway
//!
//! This crate holds everything in the gateway that can be expressed as a pure
//! function: the domain types, 2-decimal money, the tax/fee calculator and
//! input validation. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Cell Gateway Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 gateway-api (axum HTTP)                         │   │
//! │  │   POST /cells/{group}/{name}/actions/{action}                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          cell-gateway (Router ─► Cells ─► Resolver)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cell-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ calculator │  │ validation│  │   │
//! │  │   │ LookupKey │  │   Money   │  │  TaxQuote  │  │   rules   │  │   │
//! │  │   │  FeeRule  │  │  round2   │  │  FeeTier   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Lookup keys, configuration values, sources
//! - [`access`] - Access rule evaluation
//! - [`money`] - Money type that is always rounded to 2 decimal places
//! - [`calculator`] - Tax and fee composition
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cell_core::calculator::{compute_quote, Adjustments};
//! use rust_decimal::Decimal;
//!
//! let amount = Decimal::from(1000);
//! let base_rate = Decimal::new(75, 3); // 0.075
//!
//! let quote = compute_quote(amount, base_rate, &Adjustments::neutral());
//! assert_eq!(quote.tax.amount(), Decimal::from(75));
//! assert_eq!(quote.total.amount(), Decimal::from(1075));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod calculator;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use calculator::{Adjustments, LookupSources, QuoteSource, TaxBreakdown, TaxQuote, TaxRequest};
pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Payload field that carries the tenant identifier.
pub const TENANT_FIELD: &str = "tenantId";

/// Maximum length of a tenant identifier.
pub const MAX_TENANT_ID_LEN: usize = 64;

/// Maximum multiplier accepted for region and item type rows.
///
/// ## Business Reason
/// Guards against a typo turning a 1.5 multiplier into 150.
pub const MAX_MULTIPLIER: i64 = 10;
