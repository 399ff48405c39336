//! Collection query options and their evaluation.
//!
//! Predicates are conjunctive only: a document matches when every `where`
//! clause matches. Values compare with document-store ordering
//! (null < boolean < number < string < array < object).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Filter, sort and pagination of a collection read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<WhereClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_after: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(WhereClause {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn start_after(mut self, cursor: impl Into<Value>) -> Self {
        self.start_after = Some(cursor.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Run `options` over the documents of one collection.
pub fn execute(options: &QueryOptions, documents: Vec<Value>) -> Vec<Value> {
    let mut matched: Vec<Value> = documents
        .into_iter()
        .filter(|doc| options.filters.iter().all(|clause| matches(doc, clause)))
        .collect();

    if let Some(order) = &options.order_by {
        // Documents without the order field never appear in an ordered query.
        matched.retain(|doc| field(doc, &order.field).is_some());
        matched.sort_by(|a, b| {
            let ordering = compare_fields(a, b, &order.field).then_with(|| compare_ids(a, b));
            match order.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        if let Some(cursor) = &options.start_after {
            matched.retain(|doc| {
                let Some(key) = field(doc, &order.field) else {
                    return false;
                };
                let ordering = compare_values(key, cursor);
                match order.direction {
                    Direction::Asc => ordering == Ordering::Greater,
                    Direction::Desc => ordering == Ordering::Less,
                }
            });
        }
    }

    if let Some(limit) = options.limit {
        matched.truncate(limit);
    }

    matched
}

/// Count the documents matching the `where` clauses, capped by `limit`.
pub fn count(options: &QueryOptions, documents: &[Value]) -> u64 {
    let matched = documents
        .iter()
        .filter(|doc| options.filters.iter().all(|clause| matches(doc, clause)))
        .count();
    let capped = options.limit.map_or(matched, |limit| matched.min(limit));
    capped as u64
}

fn matches(doc: &Value, clause: &WhereClause) -> bool {
    let Some(actual) = field(doc, &clause.field) else {
        return false;
    };
    let expected = &clause.value;

    match clause.op {
        FilterOp::Eq => compare_values(actual, expected) == Ordering::Equal,
        FilterOp::NotEq => !actual.is_null() && compare_values(actual, expected) != Ordering::Equal,
        FilterOp::Lt => same_kind(actual, expected) && compare_values(actual, expected) == Ordering::Less,
        FilterOp::Lte => same_kind(actual, expected) && compare_values(actual, expected) != Ordering::Greater,
        FilterOp::Gt => same_kind(actual, expected) && compare_values(actual, expected) == Ordering::Greater,
        FilterOp::Gte => same_kind(actual, expected) && compare_values(actual, expected) != Ordering::Less,
        FilterOp::ArrayContains => actual
            .as_array()
            .is_some_and(|items| items.iter().any(|item| compare_values(item, expected) == Ordering::Equal)),
        FilterOp::ArrayContainsAny => match (actual.as_array(), expected.as_array()) {
            (Some(items), Some(candidates)) => items.iter().any(|item| {
                candidates
                    .iter()
                    .any(|candidate| compare_values(item, candidate) == Ordering::Equal)
            }),
            _ => false,
        },
        FilterOp::In => expected.as_array().is_some_and(|candidates| {
            candidates
                .iter()
                .any(|candidate| compare_values(actual, candidate) == Ordering::Equal)
        }),
        FilterOp::NotIn => {
            !actual.is_null()
                && expected.as_array().is_some_and(|candidates| {
                    candidates
                        .iter()
                        .all(|candidate| compare_values(actual, candidate) != Ordering::Equal)
                })
        }
    }
}

/// Resolve a dotted field path inside a document.
fn field<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

fn compare_fields(a: &Value, b: &Value, path: &str) -> Ordering {
    match (field(a, path), field(b, path)) {
        (Some(x), Some(y)) => compare_values(x, y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_ids(a: &Value, b: &Value) -> Ordering {
    let id = |doc: &Value| doc.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    id(a).cmp(&id(b))
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    kind_rank(a) == kind_rank(b)
}

/// Total order over JSON values.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| compare_values(p, q))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}
