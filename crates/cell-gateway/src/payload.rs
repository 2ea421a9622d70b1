//! # Payload
//!
//! The argument object every cell action receives: a JSON object carrying
//! at least the tenant identifier under [`TENANT_FIELD`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use cell_core::{TenantId, ValidationError, TENANT_FIELD};

use crate::error::{GatewayError, GatewayResult};

/// Argument names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Payload(Map::new())
    }

    /// A payload carrying only the tenant.
    pub fn for_tenant(tenant: &TenantId) -> Self {
        Payload::new().with(TENANT_FIELD, tenant.as_str())
    }

    /// Accepts a JSON value as a payload; anything but an object is rejected.
    pub fn from_value(value: Value) -> GatewayResult<Self> {
        match value {
            Value::Object(map) => Ok(Payload(map)),
            _ => Err(ValidationError::invalid("payload", "must be a JSON object").into()),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The tenant the call is scoped to.
    ///
    /// ## Returns
    /// * `Err(Validation::Required)` - `tenantId` missing, null or not a string
    /// * `Err(Validation)` - `tenantId` blank or malformed
    pub fn tenant(&self) -> GatewayResult<TenantId> {
        let raw = self
            .0
            .get(TENANT_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::required(TENANT_FIELD))?;

        Ok(TenantId::parse(raw)?)
    }

    /// Deserializes the payload into an action's input type. Unknown fields
    /// (including `tenantId`) are ignored by the target type.
    pub fn parse<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| GatewayError::Validation(ValidationError::invalid("payload", e.to_string())))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Input {
        item_type: String,
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(Payload::from_value(json!([1, 2])).is_err());
        assert!(Payload::from_value(json!("tenant")).is_err());
        assert!(Payload::from_value(json!({})).is_ok());
    }

    #[test]
    fn test_tenant_extraction() {
        let payload = Payload::from_value(json!({ "tenantId": "t1" })).unwrap();
        assert_eq!(payload.tenant().unwrap().as_str(), "t1");

        for bad in [json!({}), json!({ "tenantId": null }), json!({ "tenantId": 7 })] {
            let err = Payload::from_value(bad).unwrap().tenant().unwrap_err();
            assert!(matches!(
                err,
                GatewayError::Validation(ValidationError::Required { .. })
            ));
        }

        let blank = Payload::from_value(json!({ "tenantId": "  " })).unwrap();
        assert!(matches!(blank.tenant(), Err(GatewayError::Validation(_))));
    }

    #[test]
    fn test_parse_into_input_type() {
        let payload = Payload::new().with("tenantId", "t1").with("itemType", "food");
        let input: Input = payload.parse().unwrap();
        assert_eq!(input.item_type, "food");

        let missing = Payload::new().with("tenantId", "t1").parse::<Input>();
        assert!(matches!(missing, Err(GatewayError::Validation(_))));
    }
}
