use serde_json::{json, Value};

use crate::error::{ErrorKind, ServiceError};

/// Structured response envelope used at every RPC boundary.
///
/// On the wire: `{"ok": true, "value": <any>}` for success,
/// `{"ok": false, "errorKind": "<kind>", "message": "<text>"}` for failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Ok(Value),
    Err(ServiceError),
}

impl Envelope {
    /// Build an envelope from a handler outcome.
    pub fn from_result(result: std::result::Result<Value, ServiceError>) -> Self {
        match result {
            Ok(value) => Envelope::Ok(value),
            Err(err) => Envelope::Err(err),
        }
    }

    /// Serialize to the wire shape.
    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Ok(value) => json!({ "ok": true, "value": value }),
            Envelope::Err(err) => json!({
                "ok": false,
                "errorKind": err.kind,
                "message": err.message,
            }),
        }
    }

    /// Parse the wire shape. Returns a description of what was wrong when
    /// the value is not an envelope.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        let ok = value
            .get("ok")
            .and_then(Value::as_bool)
            .ok_or_else(|| "missing boolean `ok` field".to_string())?;

        if ok {
            let inner = value
                .get("value")
                .ok_or_else(|| "ok envelope missing `value` field".to_string())?;
            return Ok(Envelope::Ok(inner.clone()));
        }

        let kind = value
            .get("errorKind")
            .cloned()
            .ok_or_else(|| "error envelope missing `errorKind` field".to_string())?;
        let kind: ErrorKind = serde_json::from_value(kind)
            .map_err(|e| format!("unrecognised errorKind: {e}"))?;
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| "error envelope missing `message` field".to_string())?
            .to_string();

        Ok(Envelope::Err(ServiceError { kind, message }))
    }

    /// Unwrap into the caller-facing result.
    pub fn into_result(self) -> std::result::Result<Value, ServiceError> {
        match self {
            Envelope::Ok(value) => Ok(value),
            Envelope::Err(err) => Err(err),
        }
    }
}

impl From<ServiceError> for Envelope {
    fn from(err: ServiceError) -> Self {
        Envelope::Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_roundtrip() {
        let envelope = Envelope::Ok(json!({"temperature": 21.5}));
        let wire = envelope.to_value();

        assert_eq!(wire["ok"], json!(true));
        assert_eq!(wire["value"]["temperature"], json!(21.5));

        let back = Envelope::from_value(&wire).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn err_roundtrip() {
        let envelope = Envelope::Err(ServiceError::not_found("peripheral heater is not found"));
        let wire = envelope.to_value();

        assert_eq!(wire["ok"], json!(false));
        assert_eq!(wire["errorKind"], json!("not_found"));

        let back = Envelope::from_value(&wire).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn null_value_is_a_valid_ok() {
        let wire = json!({"ok": true, "value": null});
        let envelope = Envelope::from_value(&wire).unwrap();
        assert_eq!(envelope, Envelope::Ok(Value::Null));
    }

    #[test]
    fn missing_ok_field_rejected() {
        let err = Envelope::from_value(&json!({"value": 1})).unwrap_err();
        assert!(err.contains("ok"));
    }

    #[test]
    fn unknown_kind_rejected() {
        let wire = json!({"ok": false, "errorKind": "transcendental", "message": "x"});
        let err = Envelope::from_value(&wire).unwrap_err();
        assert!(err.contains("errorKind"));
    }

    #[test]
    fn into_result_propagates() {
        let ok = Envelope::Ok(json!("OK")).into_result().unwrap();
        assert_eq!(ok, json!("OK"));

        let err = Envelope::Err(ServiceError::conflict("already running"))
            .into_result()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }
}
