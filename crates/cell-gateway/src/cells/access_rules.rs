//! # `access/rules`
//!
//! Storage and evaluation of access rules.
//!
//! ## Evaluation
//! ```text
//! active rules of the tenant for `resource`
//!      │
//!      ├── keep rules matching action ('*' matches all) and subject
//!      │
//!      └── highest priority wins; on a tie deny beats allow,
//!          then the lowest id. Nothing matched → deny.
//! ```

use serde_json::Value;

use cell_core::access::{evaluate as evaluate_rules, Subject};
use cell_db::NewAccessRule;

use super::{actor_id, audit, PermissionQuery};
use crate::context::GatewayContext;
use crate::error::GatewayResult;
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder
        .register(CellId::AccessRules, "create", create)?
        .register(CellId::AccessRules, "list", list)?
        .register(CellId::AccessRules, "evaluate", evaluate)
}

async fn create(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: NewAccessRule = payload.parse()?;
    input.validate()?;

    let entry = ctx.db().access_rules().insert(&tenant, &input).await?;

    audit(&tenant, actor_id(&payload), "access_rule", &entry.id, "create");
    Ok(serde_json::to_value(entry)?)
}

async fn list(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let rules = ctx.db().access_rules().list(&tenant).await?;

    Ok(serde_json::to_value(rules)?)
}

/// `{userId, role?, resource, action}` → `{allowed, ruleId?}`.
async fn evaluate(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: PermissionQuery = payload.parse()?;
    input.validate()?;

    let rules = ctx
        .db()
        .access_rules()
        .active_for_resource(&tenant, input.resource.trim())
        .await?;
    let subject = Subject {
        user_id: input.user_id,
        role: input.role,
    };
    let decision = evaluate_rules(&rules, input.resource.trim(), &input.action, &subject);

    Ok(serde_json::to_value(decision)?)
}
