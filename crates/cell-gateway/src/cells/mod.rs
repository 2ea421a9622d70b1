//! # Cells
//!
//! Action handlers, one module per cell. Cells never import each other;
//! a cell that needs another calls it through [`GatewayContext::call`].
//!
//! ## Registered Destinations
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ tax/calculator       │ calculate, resolve                               │
//! │ config/multipliers   │ list, upsertRegion, upsertItemType,              │
//! │                      │ upsertFeeTier, deactivate                        │
//! │ config/regions       │ defaults                                         │
//! │ auth/permissions     │ check                                            │
//! │ access/rules         │ create, list, evaluate                           │
//! │ b2b/groups           │ create, get, list, update,                       │
//! │                      │ addMember, removeMember                          │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! Handlers take `(GatewayContext, Payload)` and return JSON. Every payload
//! carries `tenantId`; mutating handlers emit an audit event.

use serde::Deserialize;
use tracing::info;

use cell_core::access::Decision;
use cell_core::validation::validate_name;
use cell_core::TenantId;

use crate::context::GatewayContext;
use crate::error::{GatewayError, GatewayResult};
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, Router, RouterBuilder};

pub mod access_rules;
pub mod b2b_groups;
pub mod multipliers;
pub mod permissions;
pub mod regions;
pub mod tax;

/// Builds the router with every cell registered.
pub fn router() -> Result<Router<GatewayContext>, RegistrationError> {
    let builder = RouterBuilder::new();
    let builder = tax::register(builder)?;
    let builder = multipliers::register(builder)?;
    let builder = regions::register(builder)?;
    let builder = permissions::register(builder)?;
    let builder = access_rules::register(builder)?;
    let builder = b2b_groups::register(builder)?;

    Ok(builder.build())
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Who is asking, as carried in the payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Actor {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// A permission question: may `userId` (holding `role`) perform `action`
/// on `resource`?
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PermissionQuery {
    pub user_id: String,
    #[serde(default)]
    pub role: Option<String>,
    pub resource: String,
    pub action: String,
}

impl PermissionQuery {
    pub(crate) fn validate(&self) -> GatewayResult<()> {
        validate_name("userId", &self.user_id, 128)?;
        validate_name("resource", &self.resource, 64)?;
        validate_name("action", &self.action, 64)?;
        Ok(())
    }
}

/// Optional actor id for audit events.
pub(crate) fn actor_id(payload: &Payload) -> &str {
    payload
        .get("userId")
        .and_then(|v| v.as_str())
        .unwrap_or("system")
}

/// Emits an audit event for a mutation.
pub(crate) fn audit(tenant: &TenantId, actor: &str, entity: &str, id: &str, operation: &str) {
    info!(
        target: "audit",
        tenant = %tenant,
        actor = %actor,
        entity = %entity,
        id = %id,
        operation = %operation,
        "Audit event"
    );
}

/// Asks `auth/permissions` whether `actor` may perform `action` on
/// `resource`.
///
/// ## Returns
/// * `Ok(())` - Allowed
/// * `Err(GatewayError::PermissionDenied)` - Denied by rule or by default
/// * `Err(GatewayError::Invocation)` - The permission service itself failed
pub(crate) async fn require_permission(
    ctx: &GatewayContext,
    tenant: &TenantId,
    actor: &Actor,
    resource: &str,
    action: &str,
) -> GatewayResult<()> {
    let mut payload = Payload::for_tenant(tenant)
        .with("userId", actor.user_id.as_str())
        .with("resource", resource)
        .with("action", action);
    if let Some(role) = &actor.role {
        payload = payload.with("role", role.as_str());
    }

    let result = ctx.call(CellId::AuthPermissions, "check", payload).await?;
    let decision: Decision = serde_json::from_value(result)?;

    if decision.allowed {
        Ok(())
    } else {
        Err(GatewayError::PermissionDenied(format!(
            "{} may not {action} {resource}",
            actor.user_id
        )))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::context::GatewaySettings;
    use crate::router::Channel;
    use crate::router::Destination;
    use cell_db::{Database, DbConfig};
    use serde_json::Value;
    use std::sync::Arc;

    /// A context over a fresh in-memory database with every cell registered.
    pub(crate) async fn context() -> GatewayContext {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        GatewayContext::bootstrap(db, Arc::new(MemoryCache::new()), GatewaySettings::default()).unwrap()
    }

    /// Invokes a destination as an HTTP caller would.
    pub(crate) async fn invoke(ctx: &GatewayContext, cell: CellId, action: &str, body: Value) -> GatewayResult<Value> {
        let payload = Payload::from_value(body)?;
        ctx.dispatch(&Destination::new(cell, action), payload, Channel::Http).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_cell_registers() {
        let router = router().unwrap();

        for cell in CellId::ALL {
            assert!(router.has_cell(cell), "{cell} has no actions");
        }
        assert_eq!(
            router.endpoints(CellId::B2bGroups),
            vec!["addMember", "create", "get", "list", "removeMember", "update"]
        );
    }
}
