//! # Call Router
//!
//! Resolves a destination to its registered handler and invokes it.
//!
//! ## Dispatch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Router::invoke                                 │
//! │                                                                         │
//! │  Destination { cell: CellId::B2bGroups, action: "create" }             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handlers[cell][action] ──── missing ───► GatewayError::NotFound       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  handler(ctx, payload)  ──── Err(e) ────► Invocation { source: e }     │
//! │       │                 ──── panic ─────► Invocation { Internal }      │
//! │       ▼                                                                 │
//! │  Ok(serde_json::Value)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is built once at startup through [`RouterBuilder`], which
//! rejects duplicate and malformed registrations. After `build()` it is
//! immutable and shared behind an `Arc`.
//!
//! The router is generic over the context handed to handlers so it has no
//! dependency on the rest of the gateway.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use cell_core::validation::validate_action_name;
use cell_core::ValidationError;

use crate::error::{GatewayError, GatewayResult};
use crate::payload::Payload;

// =============================================================================
// Destinations
// =============================================================================

/// Every callable unit the gateway knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellId {
    TaxCalculator,
    ConfigMultipliers,
    ConfigRegions,
    AuthPermissions,
    AccessRules,
    B2bGroups,
}

impl CellId {
    pub const ALL: [CellId; 6] = [
        CellId::TaxCalculator,
        CellId::ConfigMultipliers,
        CellId::ConfigRegions,
        CellId::AuthPermissions,
        CellId::AccessRules,
        CellId::B2bGroups,
    ];

    /// `(group, name)` as it appears in URLs.
    pub fn path(&self) -> (&'static str, &'static str) {
        match self {
            CellId::TaxCalculator => ("tax", "calculator"),
            CellId::ConfigMultipliers => ("config", "multipliers"),
            CellId::ConfigRegions => ("config", "regions"),
            CellId::AuthPermissions => ("auth", "permissions"),
            CellId::AccessRules => ("access", "rules"),
            CellId::B2bGroups => ("b2b", "groups"),
        }
    }

    /// Maps a `(group, name)` pair to a cell.
    pub fn parse(group: &str, name: &str) -> GatewayResult<Self> {
        CellId::ALL
            .into_iter()
            .find(|cell| cell.path() == (group, name))
            .ok_or_else(|| GatewayError::not_found("cell", format!("{group}/{name}")))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (group, name) = self.path();
        write!(f, "{group}/{name}")
    }
}

/// A cell plus an action within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub cell: CellId,
    pub action: String,
}

impl Destination {
    pub fn new(cell: CellId, action: impl Into<String>) -> Self {
        Destination {
            cell,
            action: action.into(),
        }
    }

    /// Builds a destination from the three URL segments.
    ///
    /// Fails with `NotFound` for an unknown `(group, name)`. Whether the
    /// action exists is checked at invocation time.
    pub fn parse(group: &str, name: &str, action: &str) -> GatewayResult<Self> {
        Ok(Destination::new(CellId::parse(group, name)?, action))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.cell, self.action)
    }
}

/// How a call entered the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// An HTTP request.
    Http,
    /// Another cell.
    Internal,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Http => write!(f, "http"),
            Channel::Internal => write!(f, "internal"),
        }
    }
}

// =============================================================================
// Registration
// =============================================================================

/// A registered action handler.
pub type Handler<C> =
    Arc<dyn Fn(C, Payload) -> BoxFuture<'static, GatewayResult<Value>> + Send + Sync>;

/// Rejected registrations. These are startup bugs, not request errors.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{cell}.{action} is already registered")]
    Duplicate { cell: CellId, action: String },

    #[error("Invalid action name for {cell}: {source}")]
    InvalidAction {
        cell: CellId,
        #[source]
        source: ValidationError,
    },
}

/// Collects handlers before the table is frozen.
pub struct RouterBuilder<C> {
    handlers: HashMap<CellId, BTreeMap<String, Handler<C>>>,
}

impl<C> Default for RouterBuilder<C> {
    fn default() -> Self {
        RouterBuilder {
            handlers: HashMap::new(),
        }
    }
}

impl<C: Send + 'static> RouterBuilder<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `cell.action`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let router = RouterBuilder::new()
    ///     .register(CellId::TaxCalculator, "calculate", |ctx, payload| async move {
    ///         tax::calculate(&ctx, &payload).await
    ///     })?
    ///     .build();
    /// ```
    pub fn register<F, Fut>(mut self, cell: CellId, action: &str, handler: F) -> Result<Self, RegistrationError>
    where
        F: Fn(C, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GatewayResult<Value>> + Send + 'static,
    {
        validate_action_name(action).map_err(|source| RegistrationError::InvalidAction { cell, source })?;

        let actions = self.handlers.entry(cell).or_default();
        if actions.contains_key(action) {
            return Err(RegistrationError::Duplicate {
                cell,
                action: action.to_string(),
            });
        }

        let handler: Handler<C> = Arc::new(move |ctx, payload| handler(ctx, payload).boxed());
        actions.insert(action.to_string(), handler);
        Ok(self)
    }

    pub fn build(self) -> Router<C> {
        let count: usize = self.handlers.values().map(BTreeMap::len).sum();
        debug!(cells = self.handlers.len(), actions = count, "Router built");

        Router {
            handlers: self.handlers,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// The frozen dispatch table.
pub struct Router<C> {
    handlers: HashMap<CellId, BTreeMap<String, Handler<C>>>,
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut cells: Vec<_> = self.handlers.keys().collect();
        cells.sort();
        f.debug_struct("Router").field("cells", &cells).finish()
    }
}

impl<C: Send + 'static> Router<C> {
    /// Invokes the handler registered for `destination`.
    ///
    /// ## Returns
    /// * `Ok(Value)` - The handler's result
    /// * `Err(GatewayError::NotFound)` - Nothing registered for the destination
    /// * `Err(GatewayError::Invocation)` - The handler failed or panicked
    pub async fn invoke(
        &self,
        ctx: C,
        destination: &Destination,
        payload: Payload,
        channel: Channel,
    ) -> GatewayResult<Value> {
        info!(
            destination = %destination.cell,
            action = %destination.action,
            channel = %channel,
            "Invoking cell"
        );

        let handler = self
            .handlers
            .get(&destination.cell)
            .and_then(|actions| actions.get(&destination.action))
            .ok_or_else(|| GatewayError::not_found("destination", destination.to_string()))?;

        let started = Instant::now();
        let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, payload))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(panic) => Err(panic),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                debug!(destination = %destination, elapsed_ms, "Cell invocation succeeded");
                Ok(value)
            }
            Ok(Err(err)) => {
                warn!(destination = %destination, elapsed_ms, error = %err, "Cell invocation failed");
                Err(GatewayError::Invocation {
                    destination: destination.cell.to_string(),
                    action: destination.action.clone(),
                    source: Box::new(err),
                })
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(destination = %destination, panic = %message, "Cell handler panicked");
                Err(GatewayError::Invocation {
                    destination: destination.cell.to_string(),
                    action: destination.action.clone(),
                    source: Box::new(GatewayError::Internal(format!("handler panicked: {message}"))),
                })
            }
        }
    }

    /// Registered actions of a cell, sorted.
    pub fn endpoints(&self, cell: CellId) -> Vec<String> {
        self.handlers
            .get(&cell)
            .map(|actions| actions.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_cell(&self, cell: CellId) -> bool {
        self.handlers.contains_key(&cell)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_router() -> Router<()> {
        RouterBuilder::new()
            .register(CellId::TaxCalculator, "echo", |_, payload: Payload| async move {
                Ok(payload.into_value())
            })
            .unwrap()
            .register(CellId::TaxCalculator, "fail", |_, _| async move {
                Err(GatewayError::PermissionDenied("nope".to_string()))
            })
            .unwrap()
            .register(CellId::TaxCalculator, "explode", |_, _| async move {
                if true {
                    panic!("boom");
                }
                Ok(Value::Null)
            })
            .unwrap()
            .build()
    }

    #[test]
    fn test_cell_paths_roundtrip() {
        for cell in CellId::ALL {
            let (group, name) = cell.path();
            assert_eq!(CellId::parse(group, name).unwrap(), cell);
        }
        assert!(matches!(
            CellId::parse("tax", "nope"),
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[test]
    fn test_registration_rejects_duplicates_and_bad_names() {
        let dup = RouterBuilder::<()>::new()
            .register(CellId::AccessRules, "list", |_, _| async { Ok(Value::Null) })
            .unwrap()
            .register(CellId::AccessRules, "list", |_, _| async { Ok(Value::Null) });
        assert!(matches!(dup, Err(RegistrationError::Duplicate { .. })));

        let bad = RouterBuilder::<()>::new().register(CellId::AccessRules, "", |_, _| async { Ok(Value::Null) });
        assert!(matches!(bad, Err(RegistrationError::InvalidAction { .. })));
    }

    #[tokio::test]
    async fn test_invoke_returns_handler_result() {
        let router = echo_router();
        let payload = Payload::new().with("tenantId", "t1");

        let result = router
            .invoke((), &Destination::new(CellId::TaxCalculator, "echo"), payload, Channel::Internal)
            .await
            .unwrap();
        assert_eq!(result, json!({ "tenantId": "t1" }));
    }

    #[tokio::test]
    async fn test_unregistered_destination_is_not_found() {
        let router = echo_router();

        let missing_action = router
            .invoke((), &Destination::new(CellId::TaxCalculator, "nope"), Payload::new(), Channel::Http)
            .await;
        assert!(matches!(missing_action, Err(GatewayError::NotFound { .. })));

        let missing_cell = router
            .invoke((), &Destination::new(CellId::B2bGroups, "create"), Payload::new(), Channel::Http)
            .await;
        assert!(matches!(missing_cell, Err(GatewayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_handler_error_is_wrapped() {
        let router = echo_router();

        let err = router
            .invoke((), &Destination::new(CellId::TaxCalculator, "fail"), Payload::new(), Channel::Http)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Invocation { .. }));
        assert!(matches!(err.root(), GatewayError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let router = echo_router();
        let destination = Destination::new(CellId::TaxCalculator, "explode");

        let err = router
            .invoke((), &destination, Payload::new(), Channel::Http)
            .await
            .unwrap_err();

        match err {
            GatewayError::Invocation { destination, action, source } => {
                assert_eq!(destination, "tax/calculator");
                assert_eq!(action, "explode");
                assert!(matches!(*source, GatewayError::Internal(ref m) if m.contains("boom")));
            }
            other => panic!("expected Invocation, got {other:?}"),
        }

        // The router keeps serving after a panic
        let ok = router
            .invoke((), &Destination::new(CellId::TaxCalculator, "echo"), Payload::new(), Channel::Http)
            .await;
        assert!(ok.is_ok());
    }

    #[test]
    fn test_endpoints_are_sorted() {
        let router = echo_router();
        assert_eq!(router.endpoints(CellId::TaxCalculator), vec!["echo", "explode", "fail"]);
        assert!(router.endpoints(CellId::B2bGroups).is_empty());
    }
}
