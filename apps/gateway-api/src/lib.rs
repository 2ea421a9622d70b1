//! # Gateway API
//!
//! HTTP front for the cell router.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Gateway API Routes                              │
//! │                                                                         │
//! │  POST /cells/{group}/{name}/actions/{action}                            │
//! │       JSON object body ──► Payload ──► Router (channel: http)          │
//! │       200 handler result | {code, message}                             │
//! │                                                                         │
//! │  GET  /cells/{group}/{name}/health                                      │
//! │       {status, configurationSource, endpoints[]}                       │
//! │                                                                         │
//! │  GET  /health                                                           │
//! │       {status: healthy | degraded | unhealthy, database, cache}        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::GatewayConfig`]. Environment variables:
//! - `CELL_GATEWAY_CONFIG` - TOML file (default: `gateway.toml`, optional)
//! - `CELL_HTTP_PORT` - HTTP port (default: 8080)
//! - `CELL_DATABASE_PATH` - SQLite file (default: `cell-gateway.db`)
//! - `CELL_REDIS_URL` - Redis connection string (default: in-process cache)
//! - `CELL_CACHE_TTL_SECS` - Cache lifetime (default: 3600)

pub mod config;
pub mod error;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use cell_gateway::{CellId, Channel, Destination, GatewayContext, Payload};

// Re-exports
pub use crate::config::{ConfigError, GatewayConfig};
pub use crate::error::{ApiError, ErrorCode};

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub ctx: GatewayContext,
}

impl AppState {
    pub fn new(ctx: GatewayContext) -> Self {
        AppState { ctx }
    }
}

/// Builds the HTTP router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cells/{group}/{name}/health", get(cell_health))
        .route("/cells/{group}/{name}/actions/{action}", post(invoke_action))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// =============================================================================
// Handlers
// =============================================================================

async fn invoke_action(
    State(state): State<AppState>,
    Path((group, name, action)): Path<(String, String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let payload = Payload::from_value(body)?;
    let destination = Destination::parse(&group, &name, &action)?;

    let result = state.ctx.dispatch(&destination, payload, Channel::Http).await?;
    Ok(Json(result))
}

async fn cell_health(
    State(state): State<AppState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let cell = CellId::parse(&group, &name)?;
    let router = state.ctx.router();

    let status = if router.has_cell(cell) { "ok" } else { "unavailable" };
    Ok(Json(json!({
        "status": status,
        "configurationSource": state.ctx.cache().backend(),
        "endpoints": router.endpoints(cell),
    })))
}

/// Overall health: the database is required, the cache is not.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state.ctx.db().health_check().await;
    let cache = state.ctx.cache();
    let cache_status = match cache.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, backend = cache.backend(), "Cache ping failed");
            "down"
        }
    };

    let (code, status) = if !database {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else if cache_status == "down" {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        code,
        Json(json!({
            "status": status,
            "database": if database { "up" } else { "down" },
            "cache": { "backend": cache.backend(), "status": cache_status },
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use cell_db::{Database, DbConfig};
    use cell_gateway::{GatewaySettings, MemoryCache};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> (Router, GatewayContext) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ctx = GatewayContext::bootstrap(db, Arc::new(MemoryCache::new()), GatewaySettings::default()).unwrap();
        (build_router(AppState::new(ctx.clone())), ctx)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, req).await
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(app, req).await
    }

    #[tokio::test]
    async fn test_calculate_with_no_config() {
        let (app, _) = app().await;

        let (status, body) = post_json(
            app,
            "/cells/tax/calculator/actions/calculate",
            json!({ "tenantId": "t1", "amount": 1000, "baseRate": 0.075, "region": "NG", "itemType": "product" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tax"], 75.0);
        assert_eq!(body["total"], 1075.0);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let (app, _) = app().await;

        let (status, body) = post_json(app.clone(), "/cells/tax/nope/actions/calculate", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = post_json(app.clone(), "/cells/tax/calculator/actions/nope", json!({ "tenantId": "t1" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = post_json(
            app.clone(),
            "/cells/tax/calculator/actions/calculate",
            json!({ "tenantId": "t1", "amount": -5, "baseRate": 0.075, "region": "NG", "itemType": "product" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = post_json(app.clone(), "/cells/tax/calculator/actions/calculate", json!([1, 2])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = post_json(
            app,
            "/cells/b2b/groups/actions/create",
            json!({ "tenantId": "t1", "userId": "bob", "name": "Wholesale" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_cell_health_lists_endpoints() {
        let (app, _) = app().await;

        let (status, body) = get_json(app.clone(), "/cells/access/rules/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["configurationSource"], "memory");
        assert_eq!(body["endpoints"], json!(["create", "evaluate", "list"]));

        let (status, _) = get_json(app, "/cells/nope/nope/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_overall_health() {
        let (app, ctx) = app().await;

        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        ctx.db().close().await;
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }
}
