//! # cell-gateway: Dispatch Layer for the Cell Gateway
//!
//! Modules ("cells") register action handlers with a typed router and reach
//! each other only through it. Configuration lookups go through a resolver
//! that always yields a value.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      cell-gateway (THIS CRATE)                          │
//! │                                                                         │
//! │   HTTP / other cell                                                     │
//! │        │ Destination { cell, action } + Payload                         │
//! │        ▼                                                                │
//! │   ┌─────────┐    ┌──────────────────────────────────────────────┐      │
//! │   │ Router  │───►│ cells/*  (tax, multipliers, regions,         │      │
//! │   │         │◄───│           permissions, access rules, b2b)    │      │
//! │   └─────────┘    └───────┬─────────────────────────┬────────────┘      │
//! │                          │                         │                    │
//! │                          ▼                         ▼                    │
//! │                 ┌──────────────────┐      ┌──────────────────┐         │
//! │                 │ ConfigResolver   │      │ cell-db repos    │         │
//! │                 │ cache ─► store   │      │ groups, rules    │         │
//! │                 │ ─► constants     │      └──────────────────┘         │
//! │                 └──────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Typed dispatch table with handler isolation
//! - [`resolver`] - Configuration fallback chain
//! - [`cache`] - Redis and in-process caches
//! - [`tax`] - Quotes with tenant configuration applied
//! - [`cells`] - Action handlers
//! - [`context`] - Shared handles passed to every handler
//! - [`payload`] - Handler arguments
//! - [`error`] - Gateway error type

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod cells;
pub mod context;
pub mod error;
pub mod payload;
pub mod resolver;
pub mod router;
pub mod tax;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{CacheError, CacheStore, MemoryCache, RedisCache};
pub use context::{GatewayContext, GatewaySettings};
pub use error::{GatewayError, GatewayResult};
pub use payload::Payload;
pub use resolver::{ConfigResolver, ConfigStore, FallbackConstants, DEFAULT_CACHE_TTL};
pub use router::{CellId, Channel, Destination, RegistrationError, Router, RouterBuilder};
