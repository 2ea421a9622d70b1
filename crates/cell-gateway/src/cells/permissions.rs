//! `auth/permissions`: the permission service other cells consult.
//!
//! `check` delegates to `access/rules.evaluate` through the router and
//! records refusals.

use serde_json::Value;
use tracing::info;

use cell_core::access::Decision;

use super::PermissionQuery;
use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder.register(CellId::AuthPermissions, "check", check)
}

/// `{userId, role?, resource, action}` → `{allowed, ruleId?}`.
async fn check(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: PermissionQuery = payload.parse()?;
    input.validate()?;

    let result = ctx.call(CellId::AccessRules, "evaluate", payload).await?;
    let decision: Decision = serde_json::from_value(result)?;

    if !decision.allowed {
        info!(
            target: "audit",
            tenant = %tenant,
            actor = %input.user_id,
            resource = %input.resource,
            action = %input.action,
            "Permission denied"
        );
    }

    Ok(serde_json::to_value(decision)?)
}
