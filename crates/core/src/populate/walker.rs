//! The relation graph walker: executes a population plan against entities.
//!
//! Dispatch is entirely over pre-compiled [`AttributeDef`] kinds. Components
//! recurse in place (they live inside the parent document and are never
//! paginated); dynamic zones apply their fragment map in original item order
//! (filtering trims, never reorders); relations and media delegate row
//! fetches to the [`EntityQuery`] collaborator. The publication-state
//! predicate is applied at every hop, and recursion depth is bounded by
//! configuration.

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use super::plan::{FragmentNode, PlanNode, PopulateSpec};
use super::source::{EntityQuery, EntityRecord, Page, QueryParams, RelatedQuery, RelationMode};
use crate::error::{CoreError, CoreResult};
use crate::publication::PublicationState;
use crate::schema::{AttributeDef, SchemaSnapshot, FILE_UID};
use crate::types::{DbId, JsonMap};

/// Dynamic-zone items carry their component uid under this key.
pub const COMPONENT_TAG: &str = "__component";

/// Walker limits. `max_depth` counts relation/component hops from the root;
/// the observed upstream behavior has no limit, bounding it here is a
/// deliberate deviation.
#[derive(Debug, Clone, Copy)]
pub struct WalkerConfig {
    pub max_depth: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self { max_depth: 10 }
    }
}

/// Executes population plans. Cheap to construct per request.
pub struct GraphWalker<'a> {
    snapshot: &'a SchemaSnapshot,
    source: &'a dyn EntityQuery,
    state: PublicationState,
    config: WalkerConfig,
}

impl<'a> GraphWalker<'a> {
    pub fn new(
        snapshot: &'a SchemaSnapshot,
        source: &'a dyn EntityQuery,
        state: PublicationState,
        config: WalkerConfig,
    ) -> Self {
        Self {
            snapshot,
            source,
            state,
            config,
        }
    }

    /// Populate one entity into its output tree.
    pub async fn populate_record(
        &self,
        uid: &str,
        record: &EntityRecord,
        spec: Option<&PopulateSpec>,
    ) -> CoreResult<Value> {
        let map = self
            .walk_entity(uid.to_string(), record.clone(), spec.cloned(), 0)
            .await?;
        Ok(Value::Object(map))
    }

    /// Populate a page of entities, keeping its pagination metadata.
    pub async fn populate_page(
        &self,
        uid: &str,
        page: Page<EntityRecord>,
        spec: Option<&PopulateSpec>,
    ) -> CoreResult<Page<Value>> {
        let mut items = Vec::with_capacity(page.items.len());
        for record in page.items {
            items.push(Value::Object(
                self.walk_entity(uid.to_string(), record, spec.cloned(), 0)
                    .await?,
            ));
        }
        Ok(Page {
            items,
            meta: page.meta,
        })
    }

    /// Relation-listing entry point: fetch one relation attribute of one
    /// entity (or the available candidates) and populate the results.
    pub async fn list_related(
        &self,
        query: &RelatedQuery<'_>,
        spec: Option<&PopulateSpec>,
    ) -> CoreResult<Page<Value>> {
        let page = self.source.find_related(query).await?;
        self.populate_page(query.target_uid, page, spec).await
    }

    fn walk_entity<'s>(
        &'s self,
        uid: String,
        record: EntityRecord,
        spec: Option<PopulateSpec>,
        depth: usize,
    ) -> BoxFuture<'s, CoreResult<JsonMap>> {
        Box::pin(async move {
            let mut out = JsonMap::new();
            out.insert("id".to_string(), Value::from(record.id));
            copy_non_populatable(self.snapshot, &uid, &record.document, &mut out);
            if self.snapshot.draft_and_publish(&uid) {
                out.insert(
                    "published_at".to_string(),
                    match record.published_at {
                        Some(ts) => Value::String(ts.to_rfc3339()),
                        None => Value::Null,
                    },
                );
            }
            out.insert(
                "created_at".to_string(),
                Value::String(record.created_at.to_rfc3339()),
            );
            out.insert(
                "updated_at".to_string(),
                Value::String(record.updated_at.to_rfc3339()),
            );

            self.apply_nodes(
                &uid,
                Some(record.id),
                &record.document,
                &mut out,
                spec.as_ref(),
                depth,
            )
            .await?;
            Ok(out)
        })
    }

    /// Populate a component payload (no row identity of its own; relations
    /// inside it are inline id lists).
    fn walk_component<'s>(
        &'s self,
        uid: String,
        payload: JsonMap,
        spec: Option<PopulateSpec>,
        depth: usize,
    ) -> BoxFuture<'s, CoreResult<JsonMap>> {
        Box::pin(async move {
            let mut out = JsonMap::new();
            if let Some(id) = payload.get("id") {
                out.insert("id".to_string(), id.clone());
            }
            copy_non_populatable(self.snapshot, &uid, &payload, &mut out);
            self.apply_nodes(&uid, None, &payload, &mut out, spec.as_ref(), depth)
                .await?;
            Ok(out)
        })
    }

    async fn apply_nodes(
        &self,
        uid: &str,
        context_id: Option<DbId>,
        doc: &JsonMap,
        out: &mut JsonMap,
        spec: Option<&PopulateSpec>,
        depth: usize,
    ) -> CoreResult<()> {
        let nodes = self.effective_nodes(uid, spec);
        if nodes.is_empty() {
            return Ok(());
        }
        if depth >= self.config.max_depth {
            return Err(CoreError::validation(
                "populate",
                format!(
                    "populate recursion exceeds the maximum depth of {}",
                    self.config.max_depth
                ),
                "maxDepth",
            ));
        }

        for (name, node) in &nodes {
            // Unknown names can only come from wildcard expansion over a
            // compiled snapshot, so this lookup always succeeds; a resolver
            // output addressing a missing attribute is a schema drift bug.
            let Some(def) = self.snapshot.attribute(uid, name) else {
                return Err(CoreError::Config(format!(
                    "populate plan addresses unknown attribute '{uid}.{name}'"
                )));
            };

            let value = match def {
                AttributeDef::Relation { kind, target, .. } => {
                    self.populate_relation(
                        uid,
                        context_id,
                        doc,
                        name,
                        target,
                        kind.is_to_many(),
                        node,
                        depth,
                    )
                    .await?
                }
                AttributeDef::Media { multiple, .. } => {
                    self.populate_relation(
                        uid, context_id, doc, name, FILE_UID, *multiple, node, depth,
                    )
                    .await?
                }
                AttributeDef::Component {
                    component,
                    repeatable,
                    ..
                } => {
                    self.populate_component(component, doc.get(name), *repeatable, node, depth)
                        .await?
                }
                AttributeDef::DynamicZone { .. } => {
                    self.populate_zone(doc.get(name), node, depth).await?
                }
                AttributeDef::Scalar { .. } => continue,
            };
            out.insert(name.clone(), value);
        }
        Ok(())
    }

    /// Wildcard expands to every populatable attribute, one level deep.
    fn effective_nodes(
        &self,
        uid: &str,
        spec: Option<&PopulateSpec>,
    ) -> IndexMap<String, PlanNode> {
        match spec {
            None => IndexMap::new(),
            Some(PopulateSpec::Wildcard) => self
                .snapshot
                .populatable_attributes(uid)
                .iter()
                .map(|name| (name.clone(), PlanNode::default()))
                .collect(),
            Some(PopulateSpec::Plan(plan)) => plan.nodes.clone(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn populate_relation(
        &self,
        uid: &str,
        context_id: Option<DbId>,
        doc: &JsonMap,
        attribute: &str,
        target_uid: &str,
        to_many: bool,
        node: &PlanNode,
        depth: usize,
    ) -> CoreResult<Value> {
        let params = QueryParams {
            filters: node.filters.clone(),
            sort: node.sort.clone(),
            pagination: node.pagination,
            published_only: self.state.published_only(self.snapshot, target_uid),
        };

        let records = match context_id {
            // Entity-level relation: resolved through link rows.
            Some(source_id) => {
                let query = RelatedQuery {
                    source_uid: uid,
                    source_id: Some(source_id),
                    attribute,
                    target_uid,
                    mode: RelationMode::Current,
                    ids_to_omit: &[],
                    params,
                };
                self.source.find_related(&query).await?.items
            }
            // Component-level relation: target ids live inline in the payload.
            None => {
                let ids = inline_ids(doc.get(attribute));
                if ids.is_empty() {
                    Vec::new()
                } else {
                    self.source.find_by_ids(target_uid, &ids, &params).await?
                }
            }
        };

        let mut populated = Vec::with_capacity(records.len());
        for record in records {
            populated.push(Value::Object(
                self.walk_entity(
                    target_uid.to_string(),
                    record,
                    node.populate.clone(),
                    depth + 1,
                )
                .await?,
            ));
        }

        Ok(if to_many {
            Value::Array(populated)
        } else {
            populated.into_iter().next().unwrap_or(Value::Null)
        })
    }

    async fn populate_component(
        &self,
        component_uid: &str,
        value: Option<&Value>,
        repeatable: bool,
        node: &PlanNode,
        depth: usize,
    ) -> CoreResult<Value> {
        if repeatable {
            let items = match value.and_then(Value::as_array) {
                Some(items) => items,
                None => return Ok(Value::Array(Vec::new())),
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let Some(payload) = item.as_object() else {
                    continue;
                };
                // Per-node filters trim repeatable items in place; components
                // are never paginated.
                if let Some(filter) = &node.filters {
                    if !filter.matches(item) {
                        continue;
                    }
                }
                out.push(Value::Object(
                    self.walk_component(
                        component_uid.to_string(),
                        payload.clone(),
                        node.populate.clone(),
                        depth + 1,
                    )
                    .await?,
                ));
            }
            Ok(Value::Array(out))
        } else {
            match value.and_then(Value::as_object) {
                Some(payload) => Ok(Value::Object(
                    self.walk_component(
                        component_uid.to_string(),
                        payload.clone(),
                        node.populate.clone(),
                        depth + 1,
                    )
                    .await?,
                )),
                None => Ok(Value::Null),
            }
        }
    }

    /// Dynamic-zone population. Output order is always a subsequence of the
    /// stored item order.
    async fn populate_zone(
        &self,
        value: Option<&Value>,
        node: &PlanNode,
        depth: usize,
    ) -> CoreResult<Value> {
        let items = match value.and_then(Value::as_array) {
            Some(items) => items,
            None => return Ok(Value::Array(Vec::new())),
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(payload) = item.as_object() else {
                continue;
            };
            let Some(component_uid) = payload.get(COMPONENT_TAG).and_then(Value::as_str) else {
                continue;
            };

            let fragment: Option<&FragmentNode> = match &node.fragments {
                // A selector is present: absent components are excluded.
                Some(map) => match map.get(component_uid) {
                    Some(fragment) if fragment.include => Some(fragment),
                    _ => continue,
                },
                // No selector: everything is included, payload only.
                None => None,
            };

            if let Some(filter) = fragment.and_then(|f| f.filters.as_ref()) {
                if !filter.matches(item) {
                    continue;
                }
            }

            let mut populated = self
                .walk_component(
                    component_uid.to_string(),
                    payload.clone(),
                    fragment.and_then(|f| f.populate.clone()),
                    depth + 1,
                )
                .await?;
            populated.insert(
                COMPONENT_TAG.to_string(),
                Value::String(component_uid.to_string()),
            );
            // Keep the tag first for readability of the output.
            populated.shift_to_front(COMPONENT_TAG);
            out.push(Value::Object(populated));
        }
        Ok(Value::Array(out))
    }
}

/// Copy every non-populatable document field into the output. Populatable
/// attributes appear only when the plan asks for them; inline relation ids
/// and raw component payloads never leak.
fn copy_non_populatable(snapshot: &SchemaSnapshot, uid: &str, doc: &JsonMap, out: &mut JsonMap) {
    let attrs = snapshot.attributes_of(uid);
    for (key, value) in doc {
        if key == "id" || key == COMPONENT_TAG {
            continue;
        }
        let populatable = attrs
            .and_then(|a| a.get(key))
            .map(AttributeDef::is_populatable)
            .unwrap_or(false);
        if !populatable {
            out.insert(key.clone(), value.clone());
        }
    }
}

/// Extract inline relation ids: a number, `{ "id": n }`, or an array of
/// either. The same shapes are accepted in write payloads, so the API layer
/// uses this when splitting relation inputs out of incoming documents.
pub fn inline_ids(value: Option<&Value>) -> Vec<DbId> {
    fn one(value: &Value) -> Option<DbId> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::Object(obj) => obj.get("id").and_then(Value::as_i64),
            _ => None,
        }
    }
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(single) => one(single).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Small extension: move a key to the front of a JSON map.
trait ShiftToFront {
    fn shift_to_front(&mut self, key: &str);
}

impl ShiftToFront for JsonMap {
    fn shift_to_front(&mut self, key: &str) {
        if let Some(value) = self.remove(key) {
            let mut fresh = JsonMap::new();
            fresh.insert(key.to_string(), value);
            fresh.extend(std::mem::take(self));
            *self = fresh;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_ids_accepts_all_shapes() {
        use serde_json::json;
        assert_eq!(inline_ids(Some(&json!(3))), vec![3]);
        assert_eq!(inline_ids(Some(&json!({"id": 4}))), vec![4]);
        assert_eq!(inline_ids(Some(&json!([1, {"id": 2}, "junk"]))), vec![1, 2]);
        assert_eq!(inline_ids(Some(&json!(null))), Vec::<DbId>::new());
        assert_eq!(inline_ids(None), Vec::<DbId>::new());
    }
}
