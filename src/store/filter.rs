//! Query filter evaluation for [`super::MemoryStore`].
//!
//! Supports field equality, `$eq $ne $gt $gte $lt $lte $in $nin $exists`,
//! and the logical `$and $or $nor`. Dotted keys address nested documents.
//! Numbers compare across BSON numeric types; other values compare only
//! within their own type.

use crate::error::{Error, Result};
use bson::{Bson, Document};
use std::cmp::Ordering;

// Server code for BadValue.
const BAD_VALUE: i32 = 2;

/// Check whether `doc` satisfies `filter`. An empty filter matches everything.
pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, cond) in filter {
        let ok = match key.as_str() {
            "$and" => all_clauses(doc, key, cond)?,
            "$or" => any_clause(doc, key, cond)?,
            "$nor" => !any_clause(doc, key, cond)?,
            op if op.starts_with('$') => {
                return Err(Error::operation(
                    Some(BAD_VALUE),
                    format!("unknown top level operator: {op}"),
                ))
            }
            path => field_matches(lookup(doc, path), cond)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_clauses(doc: &Document, op: &str, cond: &Bson) -> Result<bool> {
    for clause in logical_clauses(op, cond)? {
        if !matches(doc, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_clause(doc: &Document, op: &str, cond: &Bson) -> Result<bool> {
    for clause in logical_clauses(op, cond)? {
        if matches(doc, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn logical_clauses<'a>(op: &str, cond: &'a Bson) -> Result<Vec<&'a Document>> {
    let bad = || Error::operation(Some(BAD_VALUE), format!("{op} must be a nonempty array of documents"));
    let arr = cond.as_array().filter(|a| !a.is_empty()).ok_or_else(bad)?;
    arr.iter().map(|c| c.as_document().ok_or_else(bad)).collect()
}

/// Resolve a dotted path inside `doc`.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_operator_expression(cond: &Bson) -> bool {
    match cond {
        Bson::Document(d) => d.keys().next().is_some_and(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(value: Option<&Bson>, cond: &Bson) -> Result<bool> {
    let expr = match cond {
        Bson::Document(d) if is_operator_expression(cond) => d,
        _ => return Ok(equals(value, cond)),
    };

    for (op, arg) in expr {
        let ok = match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$gt" => compares(value, arg, |o| o == Ordering::Greater),
            "$gte" => compares(value, arg, |o| o != Ordering::Less),
            "$lt" => compares(value, arg, |o| o == Ordering::Less),
            "$lte" => compares(value, arg, |o| o != Ordering::Greater),
            "$in" => in_list(value, op, arg)?,
            "$nin" => !in_list(value, op, arg)?,
            "$exists" => value.is_some() == truthy(arg),
            other => {
                return Err(Error::operation(
                    Some(BAD_VALUE),
                    format!("unknown operator: {other}"),
                ))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(value: Option<&Bson>, op: &str, arg: &Bson) -> Result<bool> {
    let items = arg
        .as_array()
        .ok_or_else(|| Error::operation(Some(BAD_VALUE), format!("{op} needs an array")))?;
    Ok(items.iter().any(|item| equals(value, item)))
}

fn truthy(arg: &Bson) -> bool {
    match arg {
        Bson::Boolean(b) => *b,
        Bson::Null => false,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

/// Equality as the server applies it: a missing field equals null, and an
/// array field matches if the whole array or any element equals `target`.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        None => matches!(target, Bson::Null),
        Some(Bson::Array(items)) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, target))
        }
        Some(v) => values_equal(v, target),
    }
}

fn compares(value: Option<&Bson>, target: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        None => false,
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, target).is_some_and(&accept)),
        Some(v) => compare_values(v, target).is_some_and(accept),
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Order two values of the same type class; `None` if they are not comparable.
pub(crate) fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Null, Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
