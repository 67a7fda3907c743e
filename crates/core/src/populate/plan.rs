//! Normalized population plans.
//!
//! A plan is a finite tree keyed by attribute name. Node maps preserve the
//! client's key order (IndexMap) because population output order is
//! observable. Wildcard stays an explicit marker: it means "populate one
//! level, no further recursion", and is expanded against the target schema
//! at walk time.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;

/// What to populate beneath one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulateSpec {
    /// Every populatable attribute, one level deep.
    Wildcard,
    Plan(PopulatePlan),
}

/// Attribute name → plan node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulatePlan {
    pub nodes: IndexMap<String, PlanNode>,
}

impl PopulatePlan {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a dotted path (`["third", "fooRef"]`), creating default nodes
    /// along the way. Later segments become nested plans.
    pub fn insert_path(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let node = self.nodes.entry(first.to_string()).or_default();
        if rest.is_empty() {
            return;
        }
        let nested = match &mut node.populate {
            Some(PopulateSpec::Plan(plan)) => plan,
            // A wildcard being refined by an explicit deeper path keeps the
            // explicit part; the path-list and object forms must agree.
            _ => {
                node.populate = Some(PopulateSpec::Plan(PopulatePlan::default()));
                match &mut node.populate {
                    Some(PopulateSpec::Plan(plan)) => plan,
                    _ => unreachable!(),
                }
            }
        };
        nested.insert_path(rest);
    }
}

/// Per-attribute population parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanNode {
    /// Scoped to the direct children fetched at this node; never inherited
    /// by sibling branches.
    pub filters: Option<Filter>,
    pub sort: Vec<SortKey>,
    pub pagination: Option<PageRequest>,
    pub populate: Option<PopulateSpec>,
    /// Dynamic-zone fragment selector (`on`). When present, items whose
    /// component is absent from the map are excluded.
    pub fragments: Option<IndexMap<String, FragmentNode>>,
}

/// One dynamic-zone fragment selector entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentNode {
    /// `on: { "shared.quote": false }` keeps the key but excludes the items.
    pub include: bool,
    pub filters: Option<Filter>,
    pub populate: Option<PopulateSpec>,
}

/// One sort criterion, parsed from `"field"` / `"field:desc"` forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parse the `sort` value of a node: a single string or an array of
    /// strings.
    pub fn parse_many(raw: &Value, path: &str) -> CoreResult<Vec<SortKey>> {
        match raw {
            Value::String(s) => Ok(vec![SortKey::parse_one(s, path)?]),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .ok_or_else(|| {
                            CoreError::validation(
                                path,
                                "sort entries must be strings",
                                "invalidSort",
                            )
                        })
                        .and_then(|s| SortKey::parse_one(s, path))
                })
                .collect(),
            _ => Err(CoreError::validation(
                path,
                "sort must be a string or an array of strings",
                "invalidSort",
            )),
        }
    }

    fn parse_one(raw: &str, path: &str) -> CoreResult<SortKey> {
        let (field, order) = match raw.split_once(':') {
            Some((field, order)) => (field, order),
            None => (raw, "asc"),
        };
        let descending = match order {
            "asc" | "ASC" => false,
            "desc" | "DESC" => true,
            other => {
                return Err(CoreError::validation(
                    path,
                    format!("unknown sort order '{other}'"),
                    "invalidSort",
                ));
            }
        };
        Ok(SortKey {
            field: field.to_string(),
            descending,
        })
    }
}

/// A validated page request. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u64 = 25;
    pub const MAX_PAGE_SIZE: u64 = 100;

    /// Build from optional raw values, clamping into the allowed range.
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    /// Parse a `pagination: { page, pageSize }` object.
    pub fn parse(raw: &Value, path: &str) -> CoreResult<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            CoreError::validation(path, "pagination must be an object", "invalidPagination")
        })?;
        Ok(Self::new(
            read_u64(obj.get("page")),
            read_u64(obj.get("pageSize")),
        ))
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Accept numbers or numeric strings (query-string values arrive as strings).
fn read_u64(raw: Option<&Value>) -> Option<u64> {
    match raw? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
