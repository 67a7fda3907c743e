//! Translation of filter trees, sort keys, and pagination into SQL.
//!
//! The SQL predicates mirror the in-memory evaluation in
//! `canopy_core::filter` exactly: range operators only match when the stored
//! value has the operand's type, `$null` observes missing fields, and string
//! operators never match non-strings. Field paths are validated before they
//! are spliced into the query text; operands are always bound.

use canopy_core::error::{CoreError, CoreResult};
use canopy_core::filter::{Filter, Op};
use canopy_core::populate::{PageRequest, SortKey};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

/// Where a filter path lands in the `entities` table.
enum FieldRef {
    Id,
    Timestamp(&'static str),
    /// Dotted path into the JSONB document.
    Document(Vec<String>),
}

fn resolve_field(prefix: &str, path: &str) -> CoreResult<FieldRef> {
    match path {
        "id" => return Ok(FieldRef::Id),
        "published_at" | "publishedAt" => return Ok(FieldRef::Timestamp("published_at")),
        "created_at" | "createdAt" => return Ok(FieldRef::Timestamp("created_at")),
        "updated_at" | "updatedAt" => return Ok(FieldRef::Timestamp("updated_at")),
        _ => {}
    }
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    for segment in &segments {
        let valid = !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(CoreError::validation(
                format!("filters.{path}"),
                format!("invalid field path '{path}'"),
                "invalidFilter",
            ));
        }
    }
    let _ = prefix;
    Ok(FieldRef::Document(segments))
}

impl FieldRef {
    /// JSONB expression (`e.document #> '{a,b}'`).
    fn json(&self, prefix: &str) -> String {
        match self {
            FieldRef::Document(segments) => {
                format!("{prefix}document #> '{{{}}}'", segments.join(","))
            }
            _ => unreachable!("column fields have no json expression"),
        }
    }

    /// Text extraction (`e.document #>> '{a,b}'`).
    fn text(&self, prefix: &str) -> String {
        match self {
            FieldRef::Document(segments) => {
                format!("{prefix}document #>> '{{{}}}'", segments.join(","))
            }
            _ => unreachable!("column fields have no text expression"),
        }
    }

    fn column(&self, prefix: &str) -> String {
        match self {
            FieldRef::Id => format!("{prefix}id"),
            FieldRef::Timestamp(name) => format!("{prefix}{name}"),
            FieldRef::Document(_) => unreachable!("document fields have no column"),
        }
    }
}

/// Append a parenthesized predicate for `filter`. `prefix` qualifies column
/// references (`""` or `"e."`).
pub fn push_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    filter: &Filter,
) -> CoreResult<()> {
    match filter {
        Filter::And(children) => push_group(qb, prefix, children, " AND ", "TRUE"),
        Filter::Or(children) => push_group(qb, prefix, children, " OR ", "FALSE"),
        Filter::Not(inner) => {
            qb.push("NOT ");
            push_filter(qb, prefix, inner)
        }
        Filter::Field { path, op } => {
            let field = resolve_field(prefix, path)?;
            push_op(qb, prefix, path, &field, op)
        }
    }
}

fn push_group(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    children: &[Filter],
    joiner: &str,
    empty: &str,
) -> CoreResult<()> {
    if children.is_empty() {
        qb.push(empty);
        return Ok(());
    }
    qb.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_filter(qb, prefix, child)?;
    }
    qb.push(")");
    Ok(())
}

fn push_op(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    path: &str,
    field: &FieldRef,
    op: &Op,
) -> CoreResult<()> {
    match field {
        FieldRef::Document(_) => push_document_op(qb, prefix, path, field, op),
        _ => push_column_op(qb, prefix, path, field, op),
    }
}

fn push_document_op(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    path: &str,
    field: &FieldRef,
    op: &Op,
) -> CoreResult<()> {
    match op {
        Op::Eq(operand) => push_document_eq(qb, prefix, field, operand),
        Op::Ne(operand) => {
            qb.push("NOT ");
            push_document_eq(qb, prefix, field, operand)
        }
        Op::Lt(bound) => push_document_range(qb, prefix, path, field, "<", bound),
        Op::Lte(bound) => push_document_range(qb, prefix, path, field, "<=", bound),
        Op::Gt(bound) => push_document_range(qb, prefix, path, field, ">", bound),
        Op::Gte(bound) => push_document_range(qb, prefix, path, field, ">=", bound),
        Op::In(candidates) => {
            if candidates.is_empty() {
                qb.push("FALSE");
                return Ok(());
            }
            qb.push("(");
            for (i, candidate) in candidates.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_document_eq(qb, prefix, field, candidate)?;
            }
            qb.push(")");
            Ok(())
        }
        Op::NotIn(candidates) => {
            qb.push("NOT ");
            push_document_op(qb, prefix, path, field, &Op::In(candidates.clone()))
        }
        Op::Contains(needle) => {
            push_like(qb, &field.text(prefix), "%", needle, "%", false);
            Ok(())
        }
        Op::NotContains(needle) => {
            // Missing and non-string values count as "does not contain".
            push_like(qb, &field.text(prefix), "%", needle, "%", true);
            Ok(())
        }
        Op::StartsWith(needle) => {
            push_like(qb, &field.text(prefix), "", needle, "%", false);
            Ok(())
        }
        Op::EndsWith(needle) => {
            push_like(qb, &field.text(prefix), "%", needle, "", false);
            Ok(())
        }
        Op::Null => {
            let expr = field.json(prefix);
            qb.push(format!("({expr} IS NULL OR {expr} = 'null'::jsonb)"));
            Ok(())
        }
        Op::NotNull => {
            let expr = field.json(prefix);
            qb.push(format!(
                "({expr} IS NOT NULL AND {expr} <> 'null'::jsonb)"
            ));
            Ok(())
        }
    }
}

/// Equality with the in-memory semantics: `null` also matches a missing
/// field; numbers compare numerically (native jsonb behavior).
fn push_document_eq(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    field: &FieldRef,
    operand: &Value,
) -> CoreResult<()> {
    let expr = field.json(prefix);
    if operand.is_null() {
        qb.push(format!("({expr} IS NULL OR {expr} = 'null'::jsonb)"));
        return Ok(());
    }
    qb.push(format!("{expr} = "));
    qb.push_bind(Json(operand.clone()));
    Ok(())
}

/// Range comparison, guarded by the stored value's jsonb type so that
/// incomparable pairs never match (matching the in-memory evaluator).
fn push_document_range(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    path: &str,
    field: &FieldRef,
    cmp: &str,
    bound: &Value,
) -> CoreResult<()> {
    let json = field.json(prefix);
    let text = field.text(prefix);
    match bound {
        Value::Number(n) => {
            let bound = n.as_f64().unwrap_or(f64::NAN);
            qb.push(format!(
                "(jsonb_typeof({json}) = 'number' AND ({text})::numeric {cmp} "
            ));
            qb.push_bind(bound);
            qb.push(")");
            Ok(())
        }
        Value::String(s) => {
            qb.push(format!("(jsonb_typeof({json}) = 'string' AND {text} {cmp} "));
            qb.push_bind(s.clone());
            qb.push(")");
            Ok(())
        }
        _ => Err(CoreError::validation(
            format!("filters.{path}"),
            "range operators expect a number or string operand",
            "invalidFilter",
        )),
    }
}

fn push_like(
    qb: &mut QueryBuilder<'_, Postgres>,
    expr: &str,
    before: &str,
    needle: &str,
    after: &str,
    negated: bool,
) {
    let pattern = format!("{before}{}{after}", escape_like(needle));
    if negated {
        qb.push(format!("({expr} IS NULL OR {expr} NOT LIKE "));
        qb.push_bind(pattern);
        qb.push(")");
    } else {
        qb.push(format!("{expr} LIKE "));
        qb.push_bind(pattern);
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn push_column_op(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    path: &str,
    field: &FieldRef,
    op: &Op,
) -> CoreResult<()> {
    let column = field.column(prefix);
    let invalid = |message: &str| {
        CoreError::validation(format!("filters.{path}"), message, "invalidFilter")
    };

    let mut simple = |cmp: &str, operand: &Value| -> CoreResult<()> {
        qb.push(format!("{column} {cmp} "));
        match field {
            FieldRef::Id => {
                let id = operand
                    .as_i64()
                    .or_else(|| operand.as_str().and_then(|s| s.parse().ok()))
                    .ok_or_else(|| invalid("id filters expect an integer"))?;
                qb.push_bind(id);
            }
            FieldRef::Timestamp(_) => {
                let ts = operand
                    .as_str()
                    .ok_or_else(|| invalid("timestamp filters expect a string"))?;
                qb.push_bind(ts.to_string());
                qb.push("::timestamptz");
            }
            FieldRef::Document(_) => unreachable!(),
        }
        Ok(())
    };

    match op {
        Op::Eq(operand) => simple("=", operand),
        Op::Ne(operand) => simple("<>", operand),
        Op::Lt(operand) => simple("<", operand),
        Op::Lte(operand) => simple("<=", operand),
        Op::Gt(operand) => simple(">", operand),
        Op::Gte(operand) => simple(">=", operand),
        Op::In(candidates) | Op::NotIn(candidates) => {
            let negated = matches!(op, Op::NotIn(_));
            if candidates.is_empty() {
                qb.push(if negated { "TRUE" } else { "FALSE" });
                return Ok(());
            }
            if negated {
                qb.push("NOT ");
            }
            qb.push("(");
            for (i, candidate) in candidates.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_column_op(qb, prefix, path, field, &Op::Eq(candidate.clone()))?;
            }
            qb.push(")");
            Ok(())
        }
        Op::Null => {
            qb.push(format!("{column} IS NULL"));
            Ok(())
        }
        Op::NotNull => {
            qb.push(format!("{column} IS NOT NULL"));
            Ok(())
        }
        Op::Contains(_) | Op::NotContains(_) | Op::StartsWith(_) | Op::EndsWith(_) => {
            Err(invalid("string operators do not apply to this field"))
        }
    }
}

/// Append an `ORDER BY` clause. Document fields sort by jsonb ordering,
/// columns natively; `id` is always the final tiebreak so pagination is
/// stable.
pub fn push_order_by(
    qb: &mut QueryBuilder<'_, Postgres>,
    prefix: &str,
    sort: &[SortKey],
) -> CoreResult<()> {
    qb.push(" ORDER BY ");
    for key in sort {
        let field = resolve_field(prefix, &key.field)?;
        let expr = match &field {
            FieldRef::Document(_) => field.json(prefix),
            _ => field.column(prefix),
        };
        qb.push(expr);
        qb.push(if key.descending { " DESC" } else { " ASC" });
        qb.push(", ");
    }
    qb.push(format!("{prefix}id ASC"));
    Ok(())
}

/// Append `LIMIT`/`OFFSET` for one page.
pub fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    qb.push(format!(" LIMIT {} OFFSET {}", page.page_size, page.offset()));
}
