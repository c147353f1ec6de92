//! Filters, sort keys and find requests.
//!
//! Filters are a small expression tree ([`Expr`]) that every backend translates or
//! evaluates through the [`QueryVisitor`] trait. The model never rewrites a
//! caller's filter; it is handed to the backend as built.
//!
//! ```ignore
//! use docmodel::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("state", "supply").and(Filter::gt("weight", 0)))
//!     .sort("name", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document};

use crate::error::DocumentStoreError;

/// Name of the identity field.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The numeric form used by document databases (`1` / `-1`).
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// How an [`Expr::Field`] compares the stored value with its operand.
///
/// `Contains` and `NotContains` test substrings on strings and membership on
/// arrays. `AnyOf` and `NoneOf` take an array operand; a scalar is treated as a
/// one-element array.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    AnyOf,
    NoneOf,
}

/// A filter over stored documents. Dotted field names address nested documents.
///
/// An empty [`Expr::And`] matches every document; [`Filter::all`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present (`true`) or missing (`false`).
    Exists(String, bool),
    Field { field: String, op: FieldOp, value: Bson },
}

impl Expr {
    fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field { field: field.into(), op, value: value.into() }
    }

    /// Requires `other` as well, extending an existing conjunction in place.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

impl Default for Expr {
    fn default() -> Self {
        Filter::all()
    }
}

/// A find request: filter, window, sort keys and projection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// `{field: 1}` includes, `{field: 0}` excludes.
    pub projection: Option<Document>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// A query carrying only a filter.
    pub fn filtered(filter: Expr) -> Self {
        Query { filter: Some(filter), ..Query::default() }
    }

    /// The filter to run, matching everything when none was set.
    pub fn filter_or_all(&self) -> Expr {
        self.filter.clone().unwrap_or_default()
    }
}

/// Constructors for [`Expr`] leaves.
///
/// ```ignore
/// use docmodel::query::Filter;
///
/// let adults = Filter::eq("state", "supply").and(Filter::gte("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches the document whose identity equals `id`.
    pub fn id(id: impl Into<Bson>) -> Expr {
        Expr::field(ID_FIELD, FieldOp::Eq, id)
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::Lte, value)
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::StartsWith, prefix)
    }

    pub fn ends_with(field: impl Into<String>, suffix: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::EndsWith, suffix)
    }

    /// Matches documents missing `field`.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// The field equals one of `values`.
    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::AnyOf, values)
    }

    /// The field equals none of `values`.
    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field, FieldOp::NoneOf, values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key after those already added.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.query.projection = Some(projection);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks an [`Expr`]; backends implement it to translate or evaluate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, present) => self.visit_exists(field, *present),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_flattens_into_existing_conjunction() {
        let expr = Filter::eq("a", 1).and(Filter::eq("b", 2)).and(Filter::eq("c", 3));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected a flat conjunction, got {other:?}"),
        }
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert_eq!(Query::new().filter_or_all(), Expr::And(Vec::new()));
        assert_eq!(
            Query::filtered(Filter::id(1)).filter_or_all(),
            Expr::Field { field: ID_FIELD.to_string(), op: FieldOp::Eq, value: Bson::Int32(1) }
        );
    }

    #[test]
    fn builder_keeps_sort_keys_in_order() {
        let query = Query::builder()
            .sort("weight", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .build();

        assert_eq!(query.sort, vec![Sort::desc("weight"), Sort::asc("name")]);
    }
}
