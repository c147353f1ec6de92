//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions,
//! enabling filtering and comparison operations on BSON documents. Field names
//! may be dotted paths into nested documents. A comparison against an array
//! field matches when any element matches, and a missing field compares equal
//! to null, as document databases do.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use std::{cmp::Ordering, collections::HashMap};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// This enum wraps BSON values and provides comparison operations for
/// filtering queries. It normalizes numeric types to f64 for easy comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    fn total_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Orders two documents by a list of sort keys.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &[Sort]) -> Ordering {
    static NULL: Bson = Bson::Null;

    for key in sort {
        let a = Comparable::from(lookup(left, &key.field).unwrap_or(&NULL));
        let b = Comparable::from(lookup(right, &key.field).unwrap_or(&NULL));
        let ordering = match key.direction {
            SortDirection::Asc => a.total_cmp(&b),
            SortDirection::Desc => b.total_cmp(&a),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare(ordering: Ordering, op: &FieldOp) -> bool {
    match op {
        FieldOp::Gt => ordering == Ordering::Greater,
        FieldOp::Gte => ordering != Ordering::Less,
        FieldOp::Lt => ordering == Ordering::Less,
        FieldOp::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Evaluates one operator against one stored value (no array expansion).
fn matches_value(stored: &Comparable<'_>, op: &FieldOp, value: &Comparable<'_>) -> bool {
    match op {
        FieldOp::Eq => stored == value,
        FieldOp::Ne => stored != value,
        FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => stored
            .partial_cmp(value)
            .is_some_and(|ordering| compare(ordering, op)),
        FieldOp::Contains => match (stored, value) {
            (Comparable::String(left), Comparable::String(right)) => left.contains(right),
            _ => false,
        },
        FieldOp::NotContains => !matches_value(stored, &FieldOp::Contains, value),
        FieldOp::StartsWith => match (stored, value) {
            (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
            _ => false,
        },
        FieldOp::EndsWith => match (stored, value) {
            (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
            _ => false,
        },
        FieldOp::AnyOf => match value {
            Comparable::Array(values) => values.iter().any(|candidate| stored == candidate),
            single => stored == single,
        },
        FieldOp::NoneOf => !matches_value(stored, &FieldOp::AnyOf, value),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns `true` when `document` matches `expr`.
    pub fn matches(document: &Document, expr: &Expr) -> DocumentStoreResult<bool> {
        DocumentEvaluator::new(document).evaluate(expr)
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == present)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = Comparable::from(value);

        let Some(stored) = lookup(self.document, field) else {
            // A missing field behaves like null.
            return Ok(matches_value(&Comparable::Null, op, &value));
        };

        let stored = Comparable::from(stored);
        Ok(match (&stored, op) {
            // Negative operators must hold for every element.
            (Comparable::Array(items), FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf) => {
                matches_value(&stored, op, &value)
                    && items.iter().all(|item| matches_value(item, op, &value))
            }
            (Comparable::Array(items), _) => {
                matches_value(&stored, op, &value)
                    || items.iter().any(|item| matches_value(item, op, &value))
            }
            _ => matches_value(&stored, op, &value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    fn product() -> Document {
        doc! {
            "name": "crate",
            "weight": 12.5,
            "volume": { "length": 4, "width": 2, "height": 1 },
            "tags": ["wood", "large"],
            "state": "supply",
        }
    }

    fn check(expr: Expr) -> bool {
        DocumentEvaluator::matches(&product(), &expr).unwrap()
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        assert!(check(Filter::eq("volume.length", 4)));
        assert!(check(Filter::gt("volume.width", 1)));
        assert!(!check(Filter::eq("volume.depth", 1)));
        assert!(check(Filter::not_exists("volume.depth")));
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(check(Filter::gte("weight", 12)));
        assert!(check(Filter::lt("weight", 13i64)));
        assert!(check(Filter::eq("volume.height", 1.0)));
    }

    #[test]
    fn array_fields_match_any_element() {
        assert!(check(Filter::eq("tags", "wood")));
        assert!(check(Filter::any_of("tags", vec!["metal", "large"])));
        assert!(!check(Filter::ne("tags", "wood")));
        assert!(check(Filter::none_of("tags", vec!["metal"])));
    }

    #[test]
    fn missing_fields_compare_as_null() {
        assert!(check(Filter::eq("discontinued", Bson::Null)));
        assert!(check(Filter::ne("discontinued", true)));
        assert!(!check(Filter::eq("discontinued", true)));
    }

    #[test]
    fn object_ids_compare_by_value() {
        let oid = ObjectId::new();
        let doc = doc! { "_id": oid };
        assert!(DocumentEvaluator::matches(&doc, &Filter::id(oid)).unwrap());
        assert!(!DocumentEvaluator::matches(&doc, &Filter::id(ObjectId::new())).unwrap());
    }

    #[test]
    fn sort_orders_by_type_then_value() {
        let mut docs = vec![
            doc! { "k": "b" },
            doc! { "k": 2 },
            doc! {},
            doc! { "k": "a" },
            doc! { "k": 1.5 },
        ];
        docs.sort_by(|a, b| compare_documents(a, b, &[Sort::asc("k")]));

        let keys: Vec<_> = docs.iter().map(|d| d.get("k").cloned()).collect();
        assert_eq!(
            keys,
            vec![
                None,
                Some(Bson::Double(1.5)),
                Some(Bson::Int32(2)),
                Some(Bson::String("a".into())),
                Some(Bson::String("b".into())),
            ]
        );
    }
}
