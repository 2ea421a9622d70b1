//! # `b2b/groups`
//!
//! CRUD for B2B customer groups and their members.
//!
//! ## Permission Flow
//! ```text
//! create / update / addMember / removeMember
//!      │
//!      ▼
//! router ──► auth/permissions.check { resource: "b2b_groups", action }
//!      │
//!      ├── allowed ──► repository write ──► audit event
//!      └── denied ───► GatewayError::PermissionDenied
//! ```
//!
//! Reads (`get`, `list`) are tenant-scoped but not permission-checked.

use serde::Deserialize;
use serde_json::{json, Value};

use cell_core::validation::{validate_discount_bps, validate_name};
use cell_core::{TenantId, ValidationError};
use cell_db::{GroupChanges, NewGroup};

use super::{audit, require_permission, Actor};
use crate::context::GatewayContext;
use crate::error::{GatewayError, GatewayResult};
use crate::payload::Payload;
use crate::router::{CellId, RegistrationError, RouterBuilder};

/// Resource name the permission service knows groups by.
const RESOURCE: &str = "b2b_groups";

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_CUSTOMER_ID_LEN: usize = 64;

pub(crate) fn register(
    builder: RouterBuilder<GatewayContext>,
) -> Result<RouterBuilder<GatewayContext>, RegistrationError> {
    builder
        .register(CellId::B2bGroups, "create", create)?
        .register(CellId::B2bGroups, "get", get)?
        .register(CellId::B2bGroups, "list", list)?
        .register(CellId::B2bGroups, "update", update)?
        .register(CellId::B2bGroups, "addMember", add_member)?
        .register(CellId::B2bGroups, "removeMember", remove_member)
}

/// Actor of a mutating call, after the permission check passed.
async fn authorize(ctx: &GatewayContext, tenant: &TenantId, payload: &Payload, action: &str) -> GatewayResult<Actor> {
    let actor: Actor = payload.parse()?;
    validate_name("userId", &actor.user_id, 128)?;

    require_permission(ctx, tenant, &actor, RESOURCE, action).await?;
    Ok(actor)
}

fn validate_description(description: Option<&str>) -> GatewayResult<()> {
    if let Some(text) = description {
        if text.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::TooLong {
                field: "description".to_string(),
                max: MAX_DESCRIPTION_LEN,
            }
            .into());
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateInput {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    discount_bps: i64,
}

async fn create(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: CreateInput = payload.parse()?;
    validate_name("name", &input.name, MAX_NAME_LEN)?;
    validate_description(input.description.as_deref())?;
    validate_discount_bps(input.discount_bps)?;

    let actor = authorize(&ctx, &tenant, &payload, "create").await?;

    let group = ctx
        .db()
        .b2b_groups()
        .insert(
            &tenant,
            &NewGroup {
                name: input.name.trim().to_string(),
                description: input.description,
                discount_bps: input.discount_bps,
            },
        )
        .await?;

    audit(&tenant, &actor.user_id, "b2b_group", &group.id, "create");
    Ok(serde_json::to_value(group)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupRef {
    group_id: String,
}

/// The group plus its members.
async fn get(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: GroupRef = payload.parse()?;
    let repo = ctx.db().b2b_groups();

    let group = repo
        .get(&tenant, &input.group_id)
        .await?
        .ok_or_else(|| GatewayError::not_found("B2bGroup", &input.group_id))?;
    let members = repo.members(&tenant, &group.id).await?;

    Ok(json!({ "group": group, "members": members }))
}

async fn list(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let groups = ctx.db().b2b_groups().list(&tenant).await?;

    Ok(serde_json::to_value(groups)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInput {
    group_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    discount_bps: Option<i64>,
    #[serde(default)]
    is_active: Option<bool>,
}

async fn update(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: UpdateInput = payload.parse()?;
    if let Some(name) = &input.name {
        validate_name("name", name, MAX_NAME_LEN)?;
    }
    validate_description(input.description.as_deref())?;
    if let Some(bps) = input.discount_bps {
        validate_discount_bps(bps)?;
    }

    let actor = authorize(&ctx, &tenant, &payload, "update").await?;

    let changes = GroupChanges {
        name: input.name.map(|n| n.trim().to_string()),
        description: input.description,
        discount_bps: input.discount_bps,
        is_active: input.is_active,
    };
    let group = ctx
        .db()
        .b2b_groups()
        .update(&tenant, &input.group_id, &changes)
        .await?;

    audit(&tenant, &actor.user_id, "b2b_group", &group.id, "update");
    Ok(serde_json::to_value(group)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberInput {
    group_id: String,
    customer_id: String,
}

async fn add_member(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: MemberInput = payload.parse()?;
    validate_name("customerId", &input.customer_id, MAX_CUSTOMER_ID_LEN)?;

    let actor = authorize(&ctx, &tenant, &payload, "addMember").await?;

    let member = ctx
        .db()
        .b2b_groups()
        .add_member(&tenant, &input.group_id, input.customer_id.trim())
        .await?;

    audit(&tenant, &actor.user_id, "b2b_group_member", &input.group_id, "addMember");
    Ok(serde_json::to_value(member)?)
}

async fn remove_member(ctx: GatewayContext, payload: Payload) -> GatewayResult<Value> {
    let tenant = payload.tenant()?;
    let input: MemberInput = payload.parse()?;
    let actor = authorize(&ctx, &tenant, &payload, "removeMember").await?;

    ctx.db()
        .b2b_groups()
        .remove_member(&tenant, &input.group_id, input.customer_id.trim())
        .await?;

    audit(&tenant, &actor.user_id, "b2b_group_member", &input.group_id, "removeMember");
    Ok(json!({ "removed": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::testing::{context, invoke};
    use cell_core::access::{RuleEffect, SubjectType};
    use cell_db::NewAccessRule;

    async fn context_with_admin_rule() -> GatewayContext {
        let ctx = context().await;
        ctx.db()
            .access_rules()
            .insert(
                &TenantId::parse("t1").unwrap(),
                &NewAccessRule {
                    resource: RESOURCE.to_string(),
                    action: "*".to_string(),
                    subject_type: SubjectType::Role,
                    subject_id: Some("admin".to_string()),
                    effect: RuleEffect::Allow,
                    priority: 100,
                },
            )
            .await
            .unwrap();
        ctx
    }

    fn as_admin(body: Value) -> Value {
        let mut body = body;
        body["tenantId"] = json!("t1");
        body["userId"] = json!("ada");
        body["role"] = json!("admin");
        body
    }

    #[tokio::test]
    async fn test_group_lifecycle() {
        let ctx = context_with_admin_rule().await;

        let group = invoke(
            &ctx,
            CellId::B2bGroups,
            "create",
            as_admin(json!({ "name": "Wholesale", "discountBps": 500 })),
        )
        .await
        .unwrap();
        let id = group["id"].as_str().unwrap().to_string();

        invoke(
            &ctx,
            CellId::B2bGroups,
            "addMember",
            as_admin(json!({ "groupId": id, "customerId": "c1" })),
        )
        .await
        .unwrap();

        let updated = invoke(
            &ctx,
            CellId::B2bGroups,
            "update",
            as_admin(json!({ "groupId": id, "discountBps": 750 })),
        )
        .await
        .unwrap();
        assert_eq!(updated["discountBps"], 750);
        assert_eq!(updated["name"], "Wholesale");

        let fetched = invoke(&ctx, CellId::B2bGroups, "get", json!({ "tenantId": "t1", "groupId": id }))
            .await
            .unwrap();
        assert_eq!(fetched["members"][0]["customerId"], "c1");

        invoke(
            &ctx,
            CellId::B2bGroups,
            "removeMember",
            as_admin(json!({ "groupId": id, "customerId": "c1" })),
        )
        .await
        .unwrap();

        let listed = invoke(&ctx, CellId::B2bGroups, "list", json!({ "tenantId": "t1" }))
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_without_permission_is_denied() {
        let ctx = context_with_admin_rule().await;

        let err = invoke(
            &ctx,
            CellId::B2bGroups,
            "create",
            json!({ "tenantId": "t1", "userId": "bob", "role": "cashier", "name": "Wholesale" }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.root(), GatewayError::PermissionDenied(_)));

        let groups = ctx.db().b2b_groups().list(&TenantId::parse("t1").unwrap()).await.unwrap();
        assert!(groups.is_empty());

        // Another tenant has no rules at all
        let other = invoke(
            &ctx,
            CellId::B2bGroups,
            "create",
            json!({ "tenantId": "t2", "userId": "ada", "role": "admin", "name": "Wholesale" }),
        )
        .await
        .unwrap_err();
        assert!(matches!(other.root(), GatewayError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_validation_error() {
        let ctx = context_with_admin_rule().await;
        let body = as_admin(json!({ "name": "Wholesale" }));

        invoke(&ctx, CellId::B2bGroups, "create", body.clone()).await.unwrap();
        let err = invoke(&ctx, CellId::B2bGroups, "create", body).await.unwrap_err();

        assert!(matches!(
            err.root(),
            GatewayError::Validation(ValidationError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_tenant_reported_before_field_errors() {
        let ctx = context_with_admin_rule().await;

        for (action, body) in [
            ("create", json!({ "userId": "ada", "role": "admin", "name": " " })),
            ("update", json!({ "userId": "ada", "groupId": "g1", "discountBps": 20000 })),
            ("addMember", json!({ "userId": "ada", "groupId": "g1", "customerId": "" })),
        ] {
            let err = invoke(&ctx, CellId::B2bGroups, action, body).await.unwrap_err();
            assert!(
                matches!(
                    err.root(),
                    GatewayError::Validation(ValidationError::Required { field }) if field == "tenantId"
                ),
                "{action}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_input_and_missing_group() {
        let ctx = context_with_admin_rule().await;

        let discount = invoke(
            &ctx,
            CellId::B2bGroups,
            "create",
            as_admin(json!({ "name": "Too generous", "discountBps": 20000 })),
        )
        .await
        .unwrap_err();
        assert!(matches!(discount.root(), GatewayError::Validation(_)));

        let missing = invoke(&ctx, CellId::B2bGroups, "get", json!({ "tenantId": "t1", "groupId": "nope" }))
            .await
            .unwrap_err();
        assert!(matches!(missing.root(), GatewayError::NotFound { .. }));

        let no_group = invoke(
            &ctx,
            CellId::B2bGroups,
            "addMember",
            as_admin(json!({ "groupId": "nope", "customerId": "c1" })),
        )
        .await
        .unwrap_err();
        assert!(matches!(no_group.root(), GatewayError::NotFound { .. }));
    }
}
