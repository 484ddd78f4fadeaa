//! Audit event schema validation.
//!
//! The schema is fixed:
//!
//! ```text
//! {
//!   "date":        "YYYY-MM-DD HH:MM:SS.mmm ±HHMM",
//!   "application": string,
//!   "ipaddr":      dotted quad (octets are not range-checked),
//!   "userid":      string,
//!   "result":      boolean,
//!   "eventtype":   "login" | "password_change" | "acl_change",
//!   "message":     { "detail"?: string, ... }
//! }
//! ```
//!
//! All seven properties are required and no other top-level property is
//! allowed. Properties nested inside `message` are not restricted.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Required top-level properties, in schema order.
pub const REQUIRED_PROPERTIES: [&str; 7] = [
    "date",
    "application",
    "ipaddr",
    "userid",
    "result",
    "eventtype",
    "message",
];

/// Allowed values of `eventtype`.
pub const EVENT_TYPES: [&str; 3] = ["login", "password_change", "acl_change"];

const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3} [+-]\d{4}$";
const IPADDR_PATTERN: &str = r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$";

/// First schema constraint a payload violates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("'{0}' is a required property")]
    MissingProperty(&'static str),

    #[error("Additional properties are not allowed ('{0}' was unexpected)")]
    UnexpectedProperty(String),

    #[error("'{field}' must be of type {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("'{field}' value '{value}' does not match pattern {pattern}")]
    PatternMismatch {
        field: &'static str,
        value: String,
        pattern: &'static str,
    },

    #[error("'{field}' value '{value}' is not one of {allowed:?}")]
    NotInEnum {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DATE_PATTERN).expect("date pattern is valid"))
}

fn ipaddr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IPADDR_PATTERN).expect("ipaddr pattern is valid"))
}

/// Validate a decoded JSON value against the audit event schema.
///
/// Returns the first violated constraint. Checks run in schema order: object
/// type, required properties, additional properties, then each property.
pub fn validate_audit_log(payload: &Value) -> Result<(), SchemaViolation> {
    let result = check(payload);

    match &result {
        Ok(()) => debug!("schema_validation_passed"),
        Err(violation) => warn!(detail = %violation, "schema_validation_failed"),
    }

    result
}

fn check(payload: &Value) -> Result<(), SchemaViolation> {
    let object = payload
        .as_object()
        .ok_or(SchemaViolation::NotAnObject(json_type(payload)))?;

    for name in REQUIRED_PROPERTIES {
        if !object.contains_key(name) {
            return Err(SchemaViolation::MissingProperty(name));
        }
    }

    if let Some(extra) = object
        .keys()
        .find(|key| !REQUIRED_PROPERTIES.contains(&key.as_str()))
    {
        return Err(SchemaViolation::UnexpectedProperty(extra.clone()));
    }

    let date = expect_string(object, "date")?;
    if !date_regex().is_match(date) {
        return Err(SchemaViolation::PatternMismatch {
            field: "date",
            value: date.to_string(),
            pattern: DATE_PATTERN,
        });
    }

    expect_string(object, "application")?;

    let ipaddr = expect_string(object, "ipaddr")?;
    if !ipaddr_regex().is_match(ipaddr) {
        return Err(SchemaViolation::PatternMismatch {
            field: "ipaddr",
            value: ipaddr.to_string(),
            pattern: IPADDR_PATTERN,
        });
    }

    expect_string(object, "userid")?;

    if !object["result"].is_boolean() {
        return Err(wrong_type("result", "boolean", &object["result"]));
    }

    let eventtype = expect_string(object, "eventtype")?;
    if !EVENT_TYPES.contains(&eventtype) {
        return Err(SchemaViolation::NotInEnum {
            field: "eventtype",
            value: eventtype.to_string(),
            allowed: &EVENT_TYPES,
        });
    }

    let message = object["message"]
        .as_object()
        .ok_or_else(|| wrong_type("message", "object", &object["message"]))?;

    if let Some(detail) = message.get("detail") {
        if !detail.is_string() {
            return Err(wrong_type("message.detail", "string", detail));
        }
    }

    Ok(())
}

fn expect_string<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, SchemaViolation> {
    object[field]
        .as_str()
        .ok_or_else(|| wrong_type(field, "string", &object[field]))
}

fn wrong_type(field: &str, expected: &'static str, value: &Value) -> SchemaViolation {
    SchemaViolation::WrongType {
        field: field.to_string(),
        expected,
        actual: json_type(value),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_event() -> Value {
        json!({
            "date": "2026-02-17 14:30:45.123 -0500",
            "application": "test.com",
            "ipaddr": "192.168.1.1",
            "userid": "user1",
            "result": true,
            "eventtype": "login",
            "message": {"detail": "test"}
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut event = valid_event();
        event[field] = value;
        event
    }

    #[test]
    fn test_valid_event_passes() {
        assert_eq!(validate_audit_log(&valid_event()), Ok(()));
    }

    #[test]
    fn test_every_event_type_passes() {
        for eventtype in EVENT_TYPES {
            assert!(validate_audit_log(&with("eventtype", json!(eventtype))).is_ok());
        }
    }

    #[test]
    fn test_non_object_rejected() {
        for payload in [json!([1, 2]), json!("event"), json!(null), json!(42)] {
            assert!(matches!(
                validate_audit_log(&payload),
                Err(SchemaViolation::NotAnObject(_))
            ));
        }
    }

    #[test]
    fn test_missing_each_required_property() {
        for name in REQUIRED_PROPERTIES {
            let mut event = valid_event();
            event.as_object_mut().unwrap().remove(name);

            let err = validate_audit_log(&event).unwrap_err();
            assert_eq!(err, SchemaViolation::MissingProperty(name));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_additional_property_rejected() {
        let event = with("extra", json!("nope"));
        let err = validate_audit_log(&event).unwrap_err();
        assert_eq!(err, SchemaViolation::UnexpectedProperty("extra".to_string()));
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_missing_reported_before_additional() {
        let mut event = with("extra", json!(1));
        event.as_object_mut().unwrap().remove("userid");
        assert_eq!(
            validate_audit_log(&event),
            Err(SchemaViolation::MissingProperty("userid"))
        );
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        for bad in ["logout", "LOGIN", ""] {
            let err = validate_audit_log(&with("eventtype", json!(bad))).unwrap_err();
            assert!(matches!(err, SchemaViolation::NotInEnum { field: "eventtype", .. }));
        }
        assert!(validate_audit_log(&with("eventtype", json!(1))).is_err());
    }

    #[test]
    fn test_date_pattern() {
        assert!(validate_audit_log(&with("date", json!("2026-02-17 14:30:45.123 +0000"))).is_ok());

        for bad in [
            "2026-02-17T14:30:45.123 -0500",
            "2026-02-17 14:30:45 -0500",
            "2026-02-17 14:30:45.123",
            "2026-02-17 14:30:45.123 -05:00",
        ] {
            let err = validate_audit_log(&with("date", json!(bad))).unwrap_err();
            assert!(matches!(err, SchemaViolation::PatternMismatch { field: "date", .. }));
        }
    }

    #[test]
    fn test_ipaddr_is_permissive_about_octet_range() {
        assert!(validate_audit_log(&with("ipaddr", json!("999.999.999.999"))).is_ok());

        for bad in ["192.168.1", "192.168.1.1.1", "a.b.c.d", "1234.1.1.1"] {
            let err = validate_audit_log(&with("ipaddr", json!(bad))).unwrap_err();
            assert!(matches!(err, SchemaViolation::PatternMismatch { field: "ipaddr", .. }));
        }
    }

    #[test]
    fn test_result_must_be_boolean() {
        for bad in [json!("true"), json!(1), json!(null)] {
            let err = validate_audit_log(&with("result", bad)).unwrap_err();
            assert!(matches!(err, SchemaViolation::WrongType { expected: "boolean", .. }));
        }
    }

    #[test]
    fn test_string_fields_reject_other_types() {
        let err = validate_audit_log(&with("application", json!(5))).unwrap_err();
        assert_eq!(err.to_string(), "'application' must be of type string, got number");
    }

    #[test]
    fn test_message_shape() {
        assert!(validate_audit_log(&with("message", json!({}))).is_ok());
        // Only top-level additional properties are restricted
        assert!(validate_audit_log(&with("message", json!({"detail": "x", "extra": 1}))).is_ok());

        let err = validate_audit_log(&with("message", json!("text"))).unwrap_err();
        assert!(matches!(err, SchemaViolation::WrongType { expected: "object", .. }));

        let err = validate_audit_log(&with("message", json!({"detail": 3}))).unwrap_err();
        assert!(err.to_string().contains("message.detail"));
    }
}
