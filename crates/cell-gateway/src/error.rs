//! # Gateway Error Types
//!
//! What the router and every cell handler return.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Gateway Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Caller         │  │   Store         │  │     Dispatch            │ │
//! │  │  (4xx)          │  │                 │  │                         │ │
//! │  │  Validation     │  │  StoreUnavail.  │  │  Invocation             │ │
//! │  │  NotFound       │  │  (503, CRUD     │  │  (wraps the handler's   │ │
//! │  │  PermissionDen. │  │   cells only)   │  │   own failure)          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Internal: anything else. Detail is logged, never shown to callers.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Configuration lookups never produce `StoreUnavailable`: the resolver
//! absorbs store failures into its fallback chain.

use thiserror::Error;

use cell_core::{CoreError, ValidationError};
use cell_db::DbError;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors returned by the router and by cell handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    /// Bad payload shape or value.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown destination, action or resource.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The permission service refused the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The relational store could not serve the request.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // =========================================================================
    // Dispatch Errors
    // =========================================================================
    /// A handler failed or panicked.
    ///
    /// ## When This Occurs
    /// - The handler returned an error (`source` is that error)
    /// - The handler panicked (`source` is `Internal` with the panic message)
    #[error("{destination}.{action} failed: {source}")]
    Invocation {
        /// Cell path, `group/name`.
        destination: String,
        action: String,
        #[source]
        source: Box<GatewayError>,
    },

    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        GatewayError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The innermost error, looking through any number of `Invocation`
    /// layers. Cells calling cells nest them.
    pub fn root(&self) -> &GatewayError {
        match self {
            GatewayError::Invocation { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors caused by the caller's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.root(),
            GatewayError::Validation(_)
                | GatewayError::NotFound { .. }
                | GatewayError::PermissionDenied(_)
        )
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(validation) => GatewayError::Validation(validation),
        }
    }
}

/// Convert database errors for cell handlers.
///
/// ## Error Mapping
/// ```text
/// DbError::NotFound            → GatewayError::NotFound
/// DbError::UniqueViolation     → GatewayError::Validation (Duplicate)
/// DbError::ForeignKeyViolation → GatewayError::Validation (InvalidFormat)
/// connection / pool / internal → GatewayError::StoreUnavailable
/// Other                        → GatewayError::Internal
/// ```
impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        if err.is_unavailable() {
            return GatewayError::StoreUnavailable(err.to_string());
        }

        match err {
            DbError::NotFound { entity, id } => GatewayError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                GatewayError::Validation(ValidationError::Duplicate { field, value })
            }
            DbError::ForeignKeyViolation { message } => {
                GatewayError::Validation(ValidationError::invalid("reference", message))
            }
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON encoding failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_invocations() {
        let inner = GatewayError::PermissionDenied("b2b_groups.create".to_string());
        let wrapped = GatewayError::Invocation {
            destination: "auth/permissions".to_string(),
            action: "check".to_string(),
            source: Box::new(GatewayError::Invocation {
                destination: "b2b/groups".to_string(),
                action: "create".to_string(),
                source: Box::new(inner),
            }),
        };

        assert!(matches!(wrapped.root(), GatewayError::PermissionDenied(_)));
        assert!(wrapped.is_client_error());
        assert!(wrapped
            .to_string()
            .starts_with("auth/permissions.check failed: b2b/groups.create failed:"));
    }

    #[test]
    fn test_db_error_mapping() {
        let dup: GatewayError = DbError::duplicate("name", "Wholesale").into();
        assert!(matches!(
            dup,
            GatewayError::Validation(ValidationError::Duplicate { .. })
        ));

        let missing: GatewayError = DbError::not_found("B2bGroup", "g1").into();
        assert!(matches!(missing, GatewayError::NotFound { .. }));

        let down: GatewayError = DbError::PoolExhausted.into();
        assert!(matches!(down, GatewayError::StoreUnavailable(_)));
        assert!(!down.is_client_error());

        let query: GatewayError = DbError::QueryFailed("syntax".to_string()).into();
        assert!(matches!(query, GatewayError::Internal(_)));
    }
}
