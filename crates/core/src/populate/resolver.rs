//! Populate spec resolution: raw client values → normalized [`PopulatePlan`].
//!
//! Accepted shapes:
//! - `true` / `"*"` / truthy strings — wildcard, one level;
//! - an array of dotted paths (`"third.fooRef"`);
//! - a nested object whose keys are attribute names, with per-node
//!   `filters` / `sort` / `pagination` / `populate` and, for dynamic zones,
//!   an `on` fragment selector.
//!
//! Unknown attribute names and plan nodes on non-populatable attributes are
//! silently dropped — observed behavior, not an error. Malformed filters and
//! sort values fail with path-addressed validation errors.

use indexmap::IndexMap;
use serde_json::Value;

use super::plan::{FragmentNode, PageRequest, PlanNode, PopulatePlan, PopulateSpec, SortKey};
use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;
use crate::schema::{AttributeDef, SchemaSnapshot, FILE_UID};

/// Resolve a raw populate value against the schema of `uid`.
///
/// Returns `None` when the value is falsy (nothing to populate).
pub fn resolve(
    snapshot: &SchemaSnapshot,
    uid: &str,
    raw: &Value,
) -> CoreResult<Option<PopulateSpec>> {
    resolve_at(snapshot, uid, raw, "populate")
}

fn resolve_at(
    snapshot: &SchemaSnapshot,
    uid: &str,
    raw: &Value,
    path: &str,
) -> CoreResult<Option<PopulateSpec>> {
    match raw {
        Value::Null => Ok(None),
        Value::Bool(true) => Ok(Some(PopulateSpec::Wildcard)),
        Value::Bool(false) => Ok(None),
        Value::String(s) if s == "*" => Ok(Some(PopulateSpec::Wildcard)),
        Value::String(s) => match toggle(s) {
            Some(true) => Ok(Some(PopulateSpec::Wildcard)),
            Some(false) => Ok(None),
            // A plain string is a comma-separated path list.
            None => {
                let paths: Vec<Value> =
                    s.split(',').map(|p| Value::String(p.trim().to_string())).collect();
                resolve_paths(snapshot, uid, &paths, path)
            }
        },
        Value::Array(paths) => resolve_paths(snapshot, uid, paths, path),
        Value::Object(entries) => {
            let mut plan = PopulatePlan::default();
            for (name, value) in entries {
                let Some(def) = snapshot.attribute(uid, name) else {
                    continue; // unknown attribute: never populated, never an error
                };
                if !def.is_populatable() {
                    continue;
                }
                let node_path = format!("{path}.{name}");
                if let Some(node) = resolve_node(snapshot, def, value, &node_path)? {
                    plan.nodes.insert(name.clone(), node);
                }
            }
            Ok(Some(PopulateSpec::Plan(plan)))
        }
        other => Err(CoreError::validation(
            path,
            format!("unsupported populate value: {other}"),
            "invalidPopulate",
        )),
    }
}

fn resolve_paths(
    snapshot: &SchemaSnapshot,
    uid: &str,
    paths: &[Value],
    path: &str,
) -> CoreResult<Option<PopulateSpec>> {
    let mut plan = PopulatePlan::default();
    for entry in paths {
        let dotted = entry.as_str().ok_or_else(|| {
            CoreError::validation(path, "populate paths must be strings", "invalidPopulate")
        })?;
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
        let valid = validate_path(snapshot, uid, &segments);
        if !valid.is_empty() {
            plan.insert_path(&valid);
        }
    }
    Ok(Some(PopulateSpec::Plan(plan)))
}

/// Keep the longest prefix of `segments` that addresses populatable
/// attributes; an unknown first segment drops the whole path.
fn validate_path<'a>(
    snapshot: &SchemaSnapshot,
    uid: &str,
    segments: &[&'a str],
) -> Vec<&'a str> {
    let mut valid = Vec::with_capacity(segments.len());
    let mut current_uid = uid.to_string();
    for segment in segments {
        let Some(def) = snapshot.attribute(&current_uid, segment) else {
            break;
        };
        if !def.is_populatable() {
            break;
        }
        valid.push(*segment);
        match def {
            AttributeDef::Relation { target, .. } => current_uid = target.clone(),
            AttributeDef::Media { .. } => current_uid = FILE_UID.to_string(),
            AttributeDef::Component { component, .. } => current_uid = component.clone(),
            // Dotted paths cannot address fragments; stop here and keep the
            // zone itself.
            AttributeDef::DynamicZone { .. } => break,
            AttributeDef::Scalar { .. } => unreachable!("scalar is not populatable"),
        }
    }
    valid
}

fn resolve_node(
    snapshot: &SchemaSnapshot,
    def: &AttributeDef,
    raw: &Value,
    path: &str,
) -> CoreResult<Option<PlanNode>> {
    match raw {
        Value::Bool(true) => Ok(Some(default_node(snapshot, def, None, path)?)),
        Value::Bool(false) | Value::Null => Ok(None),
        Value::String(s) => match s.as_str() {
            "*" => Ok(Some(default_node(snapshot, def, None, path)?)),
            other => match toggle(other) {
                Some(true) => Ok(Some(default_node(snapshot, def, None, path)?)),
                Some(false) => Ok(None),
                None => Err(CoreError::validation(
                    path,
                    format!("unsupported populate toggle '{other}'"),
                    "invalidPopulate",
                )),
            },
        },
        Value::Object(entries) => resolve_node_object(snapshot, def, entries, path),
        other => Err(CoreError::validation(
            path,
            format!("unsupported populate value: {other}"),
            "invalidPopulate",
        )),
    }
}

fn resolve_node_object(
    snapshot: &SchemaSnapshot,
    def: &AttributeDef,
    entries: &serde_json::Map<String, Value>,
    path: &str,
) -> CoreResult<Option<PlanNode>> {
    let mut node = PlanNode::default();

    if let Some(raw_filters) = entries.get("filters") {
        node.filters = Some(parse_filters(raw_filters, path)?);
    }
    if let Some(raw_sort) = entries.get("sort") {
        node.sort = SortKey::parse_many(raw_sort, &format!("{path}.sort"))?;
    }
    if let Some(raw_pagination) = entries.get("pagination") {
        node.pagination = Some(PageRequest::parse(
            raw_pagination,
            &format!("{path}.pagination"),
        )?);
    }

    match def {
        AttributeDef::DynamicZone { components } => {
            if let Some(raw_on) = entries.get("on") {
                node.fragments = Some(resolve_fragments(snapshot, components, raw_on, path)?);
            } else if let Some(raw_populate) = entries.get("populate") {
                // No selector: the nested populate applies to every allowed
                // fragment type.
                let mut fragments = IndexMap::new();
                for component in components {
                    fragments.insert(
                        component.clone(),
                        FragmentNode {
                            include: true,
                            filters: None,
                            populate: resolve_at(
                                snapshot,
                                component,
                                raw_populate,
                                &format!("{path}.populate"),
                            )?,
                        },
                    );
                }
                node.fragments = Some(fragments);
            }
        }
        _ => {
            if let Some(raw_populate) = entries.get("populate") {
                let target_uid = match def {
                    AttributeDef::Relation { target, .. } => target.as_str(),
                    AttributeDef::Media { .. } => FILE_UID,
                    AttributeDef::Component { component, .. } => component.as_str(),
                    _ => unreachable!("dynamic zone handled above; scalars never reach here"),
                };
                node.populate = resolve_at(
                    snapshot,
                    target_uid,
                    raw_populate,
                    &format!("{path}.populate"),
                )?;
            }
        }
    }

    Ok(Some(node))
}

fn default_node(
    snapshot: &SchemaSnapshot,
    def: &AttributeDef,
    populate: Option<PopulateSpec>,
    _path: &str,
) -> CoreResult<PlanNode> {
    let mut node = PlanNode {
        populate,
        ..PlanNode::default()
    };
    // Dynamic zones default to "all fragments, payload only".
    if matches!(def, AttributeDef::DynamicZone { .. }) {
        node.fragments = None;
    }
    let _ = snapshot;
    Ok(node)
}

fn resolve_fragments(
    snapshot: &SchemaSnapshot,
    allowed: &[String],
    raw: &Value,
    path: &str,
) -> CoreResult<IndexMap<String, FragmentNode>> {
    let entries = raw.as_object().ok_or_else(|| {
        CoreError::validation(
            format!("{path}.on"),
            "'on' must map component uids to populate values",
            "invalidPopulate",
        )
    })?;

    let mut fragments = IndexMap::new();
    for (component, value) in entries {
        // Components outside the zone's allowed list are ignored, matching
        // the unknown-attribute rule.
        if !allowed.iter().any(|c| c == component) {
            continue;
        }
        let fragment_path = format!("{path}.on.{component}");
        let fragment = match value {
            Value::Bool(include) => FragmentNode {
                include: *include,
                filters: None,
                populate: None,
            },
            Value::String(s) => FragmentNode {
                include: toggle(s).unwrap_or(true),
                filters: None,
                populate: None,
            },
            Value::Object(obj) => FragmentNode {
                include: true,
                filters: obj
                    .get("filters")
                    .map(|f| parse_filters(f, &fragment_path))
                    .transpose()?,
                populate: match obj.get("populate") {
                    Some(p) => resolve_at(snapshot, component, p, &fragment_path)?,
                    None => None,
                },
            },
            other => {
                return Err(CoreError::validation(
                    fragment_path,
                    format!("unsupported fragment value: {other}"),
                    "invalidPopulate",
                ));
            }
        };
        fragments.insert(component.clone(), fragment);
    }
    Ok(fragments)
}

/// Parse node filters, prefixing error paths with the node's location.
fn parse_filters(raw: &Value, node_path: &str) -> CoreResult<Filter> {
    Filter::parse(raw).map_err(|err| match err {
        CoreError::Validation(mut errors) => {
            for e in &mut errors {
                e.path = format!("{node_path}.filters.{}", e.path);
            }
            CoreError::Validation(errors)
        }
        other => other,
    })
}

/// `'t'` / `'true'` / `'1'` and `'f'` / `'false'` / `'0'` act as boolean
/// toggles; anything else is not a toggle.
fn toggle(s: &str) -> Option<bool> {
    match s {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}
