//! Schema-driven validation of incoming entity documents.
//!
//! Runs before any mutation and collects every failing field into one
//! [`CoreError::Validation`] — clients get the full list, not the first
//! failure. Paths are dotted and index-addressed (`"blocks.1.body"`).

use serde_json::Value;

use crate::error::{CoreError, CoreResult, FieldError};
use crate::schema::{AttributeDef, ScalarKind, SchemaSnapshot};
use crate::types::JsonMap;

/// Validate a document against the schema of `uid`.
///
/// `partial` relaxes `required` checks for attributes absent from the
/// document (update semantics); present values are always fully checked.
pub fn validate_document(
    snapshot: &SchemaSnapshot,
    uid: &str,
    doc: &JsonMap,
    partial: bool,
) -> CoreResult<()> {
    let attrs = snapshot
        .attributes_of(uid)
        .ok_or_else(|| CoreError::Config(format!("unknown content type '{uid}'")))?;

    let mut errors = Vec::new();
    for (name, def) in attrs {
        check_attribute(snapshot, name, def, doc.get(name), partial, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}

fn check_attribute(
    snapshot: &SchemaSnapshot,
    path: &str,
    def: &AttributeDef,
    value: Option<&Value>,
    partial: bool,
    errors: &mut Vec<FieldError>,
) {
    let present = value.is_some_and(|v| !v.is_null());

    if !present {
        if def.required() && !partial {
            errors.push(FieldError::new(
                path,
                format!("{path} is required"),
                "required",
            ));
        }
        return;
    }
    let value = value.expect("present checked");

    match def {
        AttributeDef::Scalar {
            kind,
            min_length,
            max_length,
            enum_values,
            ..
        } => check_scalar(path, *kind, *min_length, *max_length, enum_values, value, errors),
        AttributeDef::Relation { .. } | AttributeDef::Media { .. } => {
            if !valid_relation_input(value) {
                errors.push(FieldError::new(
                    path,
                    format!("{path} must be an id or a list of ids"),
                    "invalidRelation",
                ));
            }
        }
        AttributeDef::Component {
            component,
            repeatable,
            min,
            max,
            ..
        } => {
            if *repeatable {
                let Some(items) = value.as_array() else {
                    errors.push(FieldError::new(
                        path,
                        format!("{path} must be an array of components"),
                        "invalidType",
                    ));
                    return;
                };
                if let Some(min) = min {
                    if (items.len() as u64) < *min {
                        errors.push(FieldError::new(
                            path,
                            format!("{path} must contain at least {min} items"),
                            "min",
                        ));
                    }
                }
                if let Some(max) = max {
                    if (items.len() as u64) > *max {
                        errors.push(FieldError::new(
                            path,
                            format!("{path} must contain at most {max} items"),
                            "max",
                        ));
                    }
                }
                for (index, item) in items.iter().enumerate() {
                    check_payload(snapshot, &format!("{path}.{index}"), component, item, errors);
                }
            } else {
                check_payload(snapshot, path, component, value, errors);
            }
        }
        AttributeDef::DynamicZone { components } => {
            let Some(items) = value.as_array() else {
                errors.push(FieldError::new(
                    path,
                    format!("{path} must be an array of dynamic zone items"),
                    "invalidType",
                ));
                return;
            };
            for (index, item) in items.iter().enumerate() {
                let item_path = format!("{path}.{index}");
                let Some(tag) = item.get("__component").and_then(Value::as_str) else {
                    errors.push(FieldError::new(
                        &item_path,
                        format!("{item_path} is missing its __component tag"),
                        "required",
                    ));
                    continue;
                };
                if !components.iter().any(|c| c == tag) {
                    errors.push(FieldError::new(
                        &item_path,
                        format!("component '{tag}' is not allowed in {path}"),
                        "invalidComponent",
                    ));
                    continue;
                }
                check_payload(snapshot, &item_path, tag, item, errors);
            }
        }
    }
}

/// Validate a component payload against its component schema.
fn check_payload(
    snapshot: &SchemaSnapshot,
    path: &str,
    component_uid: &str,
    value: &Value,
    errors: &mut Vec<FieldError>,
) {
    let Some(payload) = value.as_object() else {
        errors.push(FieldError::new(
            path,
            format!("{path} must be an object"),
            "invalidType",
        ));
        return;
    };
    let Some(attrs) = snapshot.attributes_of(component_uid) else {
        // Compilation guarantees component existence; reaching this means
        // the document was validated against a different snapshot.
        errors.push(FieldError::new(
            path,
            format!("unknown component '{component_uid}'"),
            "invalidComponent",
        ));
        return;
    };
    for (name, def) in attrs {
        check_attribute(
            snapshot,
            &format!("{path}.{name}"),
            def,
            payload.get(name),
            false,
            errors,
        );
    }
}

fn check_scalar(
    path: &str,
    kind: ScalarKind,
    min_length: Option<u64>,
    max_length: Option<u64>,
    enum_values: &[String],
    value: &Value,
    errors: &mut Vec<FieldError>,
) {
    let type_ok = match kind {
        ScalarKind::String
        | ScalarKind::Text
        | ScalarKind::RichText
        | ScalarKind::Email
        | ScalarKind::Uid
        | ScalarKind::Password
        | ScalarKind::Date
        | ScalarKind::DateTime
        | ScalarKind::Enumeration => value.is_string(),
        ScalarKind::Integer | ScalarKind::Float => value.is_number(),
        ScalarKind::Boolean => value.is_boolean(),
        ScalarKind::Json => true,
    };
    if !type_ok {
        errors.push(FieldError::new(
            path,
            format!("{path} has the wrong type for {kind:?}"),
            "invalidType",
        ));
        return;
    }

    if let Some(text) = value.as_str() {
        let len = text.chars().count() as u64;
        if let Some(min) = min_length {
            if len < min {
                errors.push(FieldError::new(
                    path,
                    format!("{path} must be at least {min} characters"),
                    "minLength",
                ));
            }
        }
        if let Some(max) = max_length {
            if len > max {
                errors.push(FieldError::new(
                    path,
                    format!("{path} must be at most {max} characters"),
                    "maxLength",
                ));
            }
        }
        if kind == ScalarKind::Enumeration
            && !enum_values.is_empty()
            && !enum_values.iter().any(|v| v == text)
        {
            errors.push(FieldError::new(
                path,
                format!("{path} must be one of: {}", enum_values.join(", ")),
                "invalidEnum",
            ));
        }
    }
}

fn valid_relation_input(value: &Value) -> bool {
    fn one(value: &Value) -> bool {
        match value {
            Value::Number(n) => n.as_i64().is_some(),
            Value::Object(obj) => obj.get("id").and_then(Value::as_i64).is_some(),
            _ => false,
        }
    }
    match value {
        Value::Array(items) => items.iter().all(one),
        single => one(single),
    }
}
