//! Filter expressions: parsing client-supplied filter objects into a typed
//! AST and evaluating them against JSON documents.
//!
//! The same AST has two consumers: the in-memory predicate here (components,
//! dynamic-zone fragments, anything already materialized) and the SQL
//! translation in `canopy-db` for row fetches. Parsing rejects unknown
//! operators with the offending dotted path; everything past the parser can
//! trust the tree.

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Comparison operator applied to one document path.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Contains(String),
    NotContains(String),
    StartsWith(String),
    EndsWith(String),
    Null,
    NotNull,
}

/// A parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// `path` is dot-separated into the document (`"author.name"`).
    Field { path: String, op: Op },
}

impl Filter {
    /// Parse a raw filter object. `{}` parses to an empty `And` (matches
    /// everything).
    pub fn parse(raw: &Value) -> CoreResult<Filter> {
        parse_node(raw, "")
    }

    /// Evaluate against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|f| f.matches(doc)),
            Filter::Or(children) => children.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
            Filter::Field { path, op } => {
                let value = lookup(doc, path);
                eval_op(op, value)
            }
        }
    }
}

fn parse_node(raw: &Value, prefix: &str) -> CoreResult<Filter> {
    let obj = raw.as_object().ok_or_else(|| {
        CoreError::validation(
            display_path(prefix),
            "filter must be an object",
            "invalidFilter",
        )
    })?;

    let mut clauses = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match key.as_str() {
            "$and" | "$or" => {
                let children = value
                    .as_array()
                    .ok_or_else(|| {
                        CoreError::validation(
                            join_path(prefix, key),
                            format!("{key} expects an array"),
                            "invalidFilter",
                        )
                    })?
                    .iter()
                    .map(|child| parse_node(child, prefix))
                    .collect::<CoreResult<Vec<_>>>()?;
                clauses.push(if key == "$and" {
                    Filter::And(children)
                } else {
                    Filter::Or(children)
                });
            }
            "$not" => clauses.push(Filter::Not(Box::new(parse_node(value, prefix)?))),
            op if op.starts_with('$') => {
                return Err(CoreError::validation(
                    join_path(prefix, op),
                    format!("unknown filter operator '{op}'"),
                    "invalidFilter",
                ));
            }
            field => {
                let path = join_path(prefix, field);
                clauses.extend(parse_field(value, &path)?);
            }
        }
    }

    Ok(match clauses.len() {
        1 => clauses.pop().expect("len checked"),
        _ => Filter::And(clauses),
    })
}

/// Parse the value under a field key: a bare value is `$eq`, an object is
/// either operators, a deeper path, or a mix of both.
fn parse_field(raw: &Value, path: &str) -> CoreResult<Vec<Filter>> {
    let Some(obj) = raw.as_object() else {
        return Ok(vec![Filter::Field {
            path: path.to_string(),
            op: Op::Eq(raw.clone()),
        }]);
    };

    let mut clauses = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        if let Some(op_name) = key.strip_prefix('$') {
            clauses.push(Filter::Field {
                path: path.to_string(),
                op: parse_op(op_name, value, path)?,
            });
        } else {
            clauses.extend(parse_field(value, &join_path(path, key))?);
        }
    }
    Ok(clauses)
}

fn parse_op(name: &str, operand: &Value, path: &str) -> CoreResult<Op> {
    let op = match name {
        "eq" => Op::Eq(operand.clone()),
        "ne" => Op::Ne(operand.clone()),
        "lt" => Op::Lt(operand.clone()),
        "lte" => Op::Lte(operand.clone()),
        "gt" => Op::Gt(operand.clone()),
        "gte" => Op::Gte(operand.clone()),
        "in" => Op::In(operand_list(operand)),
        "notIn" => Op::NotIn(operand_list(operand)),
        "contains" => Op::Contains(operand_string(operand, path, "$contains")?),
        "notContains" => Op::NotContains(operand_string(operand, path, "$notContains")?),
        "startsWith" => Op::StartsWith(operand_string(operand, path, "$startsWith")?),
        "endsWith" => Op::EndsWith(operand_string(operand, path, "$endsWith")?),
        "null" => {
            if truthy(operand) {
                Op::Null
            } else {
                Op::NotNull
            }
        }
        "notNull" => {
            if truthy(operand) {
                Op::NotNull
            } else {
                Op::Null
            }
        }
        other => {
            return Err(CoreError::validation(
                format!("{path}.${other}"),
                format!("unknown filter operator '${other}'"),
                "invalidFilter",
            ));
        }
    };
    Ok(op)
}

fn operand_list(operand: &Value) -> Vec<Value> {
    match operand {
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    }
}

fn operand_string(operand: &Value, path: &str, op: &str) -> CoreResult<String> {
    operand.as_str().map(str::to_string).ok_or_else(|| {
        CoreError::validation(
            format!("{path}.{op}"),
            format!("{op} expects a string operand"),
            "invalidFilter",
        )
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "true" | "t" | "1"),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => false,
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn display_path(prefix: &str) -> String {
    if prefix.is_empty() {
        "filters".to_string()
    } else {
        prefix.to_string()
    }
}

/// Resolve a dotted path inside a document. Missing segments resolve to
/// `Null` so `$null` can observe them.
fn lookup<'a>(doc: &'a Value, path: &str) -> &'a Value {
    let mut current = doc;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &Value::Null,
        }
    }
    current
}

fn eval_op(op: &Op, value: &Value) -> bool {
    match op {
        Op::Eq(expected) => loose_eq(value, expected),
        Op::Ne(expected) => !loose_eq(value, expected),
        Op::Lt(bound) => compare(value, bound).is_some_and(|o| o.is_lt()),
        Op::Lte(bound) => compare(value, bound).is_some_and(|o| o.is_le()),
        Op::Gt(bound) => compare(value, bound).is_some_and(|o| o.is_gt()),
        Op::Gte(bound) => compare(value, bound).is_some_and(|o| o.is_ge()),
        Op::In(candidates) => candidates.iter().any(|c| loose_eq(value, c)),
        Op::NotIn(candidates) => !candidates.iter().any(|c| loose_eq(value, c)),
        Op::Contains(needle) => value.as_str().is_some_and(|s| s.contains(needle)),
        Op::NotContains(needle) => !value.as_str().is_some_and(|s| s.contains(needle)),
        Op::StartsWith(needle) => value.as_str().is_some_and(|s| s.starts_with(needle)),
        Op::EndsWith(needle) => value.as_str().is_some_and(|s| s.ends_with(needle)),
        Op::Null => value.is_null(),
        Op::NotNull => !value.is_null(),
    }
}

/// Equality with numeric coercion: `1` and `1.0` compare equal.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for numbers and strings; incomparable pairs yield `None` and
/// fail the comparison (never match).
fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "name": "quote text",
            "number": 10,
            "author": { "name": "Ada" },
            "published_at": null,
        })
    }

    #[test]
    fn bare_value_is_eq() {
        let f = Filter::parse(&json!({"name": "quote text"})).unwrap();
        assert!(f.matches(&doc()));
        assert!(!f.matches(&json!({"name": "other"})));
    }

    #[test]
    fn numeric_comparison() {
        let f = Filter::parse(&json!({"number": {"$lt": 15}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"number": {"$gte": 11}})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn integer_and_float_compare_equal() {
        let f = Filter::parse(&json!({"number": {"$eq": 10.0}})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn nested_path_addresses_sub_documents() {
        let f = Filter::parse(&json!({"author": {"name": {"$eq": "Ada"}}})).unwrap();
        assert_eq!(
            f,
            Filter::Field {
                path: "author.name".into(),
                op: Op::Eq(json!("Ada")),
            }
        );
        assert!(f.matches(&doc()));
    }

    #[test]
    fn and_or_not() {
        let f = Filter::parse(&json!({
            "$or": [
                {"number": {"$gt": 100}},
                {"$not": {"name": {"$contains": "missing"}}},
            ]
        }))
        .unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn in_and_not_in() {
        let f = Filter::parse(&json!({"number": {"$in": [1, 10, 20]}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"number": {"$notIn": [10]}})).unwrap();
        assert!(!f.matches(&doc()));
    }

    #[test]
    fn null_observes_missing_and_null_fields() {
        let f = Filter::parse(&json!({"published_at": {"$null": true}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"no_such_field": {"$null": true}})).unwrap();
        assert!(f.matches(&doc()));
        let f = Filter::parse(&json!({"name": {"$notNull": true}})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn unknown_operator_fails_with_path() {
        let err = Filter::parse(&json!({"author": {"name": {"$like": "A%"}}})).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].path, "author.name.$like");
                assert_eq!(errors[0].name, "invalidFilter");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = Filter::parse(&json!({})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let f = Filter::parse(&json!({"name": {"$lt": "zzz"}})).unwrap();
        assert!(f.matches(&doc()));
    }

    #[test]
    fn incomparable_types_never_match_range_ops() {
        let f = Filter::parse(&json!({"author": {"$lt": 5}})).unwrap();
        assert!(!f.matches(&doc()));
    }
}
