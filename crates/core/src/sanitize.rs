//! Output sanitization: strips private attributes from populated trees.
//!
//! Applies at every depth the walker visited — nested relations by their
//! target schema, components by their component schema, dynamic-zone items
//! by their `__component` tag. Pure and idempotent: sanitizing twice is the
//! same as sanitizing once.

use serde_json::Value;

use crate::populate::COMPONENT_TAG;
use crate::schema::{AttributeDef, SchemaSnapshot, RESTRICTED_FIELDS, FILE_UID};

/// Sanitize one populated entity (or a `null` branch) of type `uid`.
pub fn sanitize_document(snapshot: &SchemaSnapshot, uid: &str, value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                if RESTRICTED_FIELDS.contains(&key.as_str()) {
                    continue;
                }
                match snapshot.attribute(uid, key) {
                    Some(def) if def.is_private() => continue,
                    Some(AttributeDef::Relation { target, .. }) => {
                        out.insert(key.clone(), sanitize_branch(snapshot, target, entry));
                    }
                    Some(AttributeDef::Media { .. }) => {
                        out.insert(key.clone(), sanitize_branch(snapshot, FILE_UID, entry));
                    }
                    Some(AttributeDef::Component { component, .. }) => {
                        out.insert(key.clone(), sanitize_branch(snapshot, component, entry));
                    }
                    Some(AttributeDef::DynamicZone { .. }) => {
                        out.insert(key.clone(), sanitize_zone(snapshot, entry));
                    }
                    // Scalars and bookkeeping fields (id, timestamps) pass
                    // through untouched.
                    _ => {
                        out.insert(key.clone(), entry.clone());
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Sanitize a list of populated entities.
pub fn sanitize_documents(snapshot: &SchemaSnapshot, uid: &str, values: &[Value]) -> Vec<Value> {
    values
        .iter()
        .map(|v| sanitize_document(snapshot, uid, v))
        .collect()
}

fn sanitize_branch(snapshot: &SchemaSnapshot, uid: &str, value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_document(snapshot, uid, item))
                .collect(),
        ),
        other => sanitize_document(snapshot, uid, other),
    }
}

fn sanitize_zone(snapshot: &SchemaSnapshot, value: &Value) -> Value {
    let Value::Array(items) = value else {
        return value.clone();
    };
    Value::Array(
        items
            .iter()
            .map(|item| {
                let Some(component_uid) = item.get(COMPONENT_TAG).and_then(Value::as_str) else {
                    return item.clone();
                };
                sanitize_document(snapshot, component_uid, item)
            })
            .collect(),
    )
}
