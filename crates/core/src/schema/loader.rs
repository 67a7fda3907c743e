//! Loads content-type and component definition files into a snapshot.
//!
//! Definitions are JSON documents, one per file:
//!
//! ```json
//! {
//!   "uid": "api::article.article",
//!   "kind": "collectionType",
//!   "draftAndPublish": true,
//!   "attributes": { "title": { "type": "string", "required": true } }
//! }
//! ```
//!
//! `"kind": "component"` marks a component schema. Any parse failure is a
//! configuration error and aborts the load; a half-loaded schema must never
//! serve requests.

use std::path::Path;

use serde_json::Value;

use super::attribute::AttributeDef;
use super::registry::{
    ComponentSchema, ContentTypeKind, ContentTypeSchema, SchemaSnapshot,
};
use crate::error::{CoreError, CoreResult};

/// One parsed definition document.
pub enum Definition {
    ContentType(ContentTypeSchema),
    Component(ComponentSchema),
}

/// Parse a single definition document.
pub fn parse_definition(raw: &Value) -> CoreResult<Definition> {
    let obj = raw
        .as_object()
        .ok_or_else(|| CoreError::Config("schema definition must be an object".into()))?;
    let uid = obj
        .get("uid")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::Config("schema definition missing 'uid'".into()))?
        .to_string();
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("collectionType");

    let mut attributes = indexmap::IndexMap::new();
    if let Some(attrs) = obj.get("attributes").and_then(Value::as_object) {
        for (name, def) in attrs {
            attributes.insert(
                name.clone(),
                AttributeDef::parse(&format!("{uid}.{name}"), def)?,
            );
        }
    }

    let def = match kind {
        "component" => Definition::Component(ComponentSchema { uid, attributes }),
        "collectionType" | "singleType" => Definition::ContentType(ContentTypeSchema {
            uid,
            kind: if kind == "singleType" {
                ContentTypeKind::SingleType
            } else {
                ContentTypeKind::CollectionType
            },
            draft_and_publish: obj
                .get("draftAndPublish")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            attributes,
        }),
        other => {
            return Err(CoreError::Config(format!(
                "{uid}: unknown schema kind '{other}'"
            )))
        }
    };
    Ok(def)
}

/// Compile a snapshot from in-memory definition documents. Shared by the
/// directory loader and by tests that build fixture schemas inline.
pub fn snapshot_from_values<'a>(
    definitions: impl IntoIterator<Item = &'a Value>,
) -> CoreResult<SchemaSnapshot> {
    let mut content_types = Vec::new();
    let mut components = Vec::new();
    for raw in definitions {
        match parse_definition(raw)? {
            Definition::ContentType(ct) => content_types.push(ct),
            Definition::Component(c) => components.push(c),
        }
    }
    SchemaSnapshot::compile(content_types, components)
}

/// Read every `*.json` definition in `dir` (sorted by file name for a
/// deterministic load order) and compile a snapshot.
pub fn load_dir(dir: &Path) -> CoreResult<SchemaSnapshot> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        CoreError::Config(format!("cannot read schema dir {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            CoreError::Config(format!("invalid JSON in {}: {e}", path.display()))
        })?;
        documents.push(value);
    }
    tracing::info!(count = documents.len(), dir = %dir.display(), "Loaded schema definitions");
    snapshot_from_values(&documents)
}
