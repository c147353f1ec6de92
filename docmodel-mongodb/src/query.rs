//! Translation from docmodel request types to MongoDB syntax.
//!
//! Filters go through [`MongoQueryTranslator`]; pipelines, updates, sort keys and
//! index declarations have small dedicated functions.

use bson::{Bson, Document, doc};
use mongodb::{IndexModel, options::IndexOptions};

use docmodel_core::{
    document::IndexSpec,
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::Stage,
    query::{Expr, FieldOp, QueryVisitor, Sort},
    update::Update,
};

/// Escapes regular expression metacharacters so `text` matches literally.
fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if "\\^$.|?*+()[]{}".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Translates docmodel query expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Document::new());
        }
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": present },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let unsupported = |what: &str| {
            DocumentStoreError::Unsupported(format!("{what} on field {field} with value {value}"))
        };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    Bson::Document(_) => return Err(unsupported("contains")),
                    other => doc! { "$eq": other },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    Bson::Array(arr) => doc! { "$nin": arr },
                    Bson::Document(_) => return Err(unsupported("not contains")),
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                    _ => return Err(unsupported("starts with")),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                    _ => return Err(unsupported("ends with")),
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(_) => doc! { "$in": value },
                    single => doc! { "$in": [single] },
                },
                FieldOp::NoneOf => match value {
                    Bson::Array(_) => doc! { "$nin": value },
                    single => doc! { "$nin": [single] },
                },
            }
        })
    }
}

/// Translates a filter expression into a query document.
pub(crate) fn translate_filter(expr: &Expr) -> DocumentStoreResult<Document> {
    MongoQueryTranslator.visit_expr(expr)
}

/// Builds a `$sort` document.
pub(crate) fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

/// Translates pipeline stages in order.
pub(crate) fn translate_pipeline(stages: &[Stage]) -> DocumentStoreResult<Vec<Document>> {
    stages
        .iter()
        .map(|stage| {
            Ok(match stage {
                Stage::Match(expr) => doc! { "$match": translate_filter(expr)? },
                Stage::Sort(keys) => doc! { "$sort": sort_document(keys) },
                Stage::Skip(n) => doc! { "$skip": *n as i64 },
                Stage::Limit(n) => doc! { "$limit": *n as i64 },
                Stage::Count(field) => doc! { "$count": field.as_str() },
                Stage::Project(projection) => doc! { "$project": projection.clone() },
                Stage::Raw(raw) => raw.clone(),
            })
        })
        .collect()
}

/// Builds an update document; operators with nothing to do are left out.
pub(crate) fn translate_update(update: &Update) -> Document {
    let mut out = Document::new();
    if !update.set.is_empty() {
        out.insert("$set", update.set.clone());
    }
    if !update.unset.is_empty() {
        let fields: Document = update
            .unset
            .iter()
            .map(|field| (field.clone(), Bson::String(String::new())))
            .collect();
        out.insert("$unset", fields);
    }
    if !update.push.is_empty() {
        out.insert("$push", update.push.clone());
    }
    out
}

/// Builds the driver's index model for a declared index.
pub(crate) fn index_model(spec: &IndexSpec) -> IndexModel {
    let keys: Document = spec
        .keys
        .iter()
        .map(|(field, direction)| (field.clone(), Bson::Int32(direction.as_i32())))
        .collect();

    let mut options = IndexOptions::default();
    options.unique = Some(spec.unique);
    options.name = Some(spec.index_name());

    IndexModel::builder().keys(keys).options(options).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmodel_core::query::Filter;

    #[test]
    fn empty_conjunction_matches_everything() {
        assert_eq!(translate_filter(&Filter::all()).unwrap(), doc! {});
    }

    #[test]
    fn field_operators_translate() {
        let expr = Filter::eq("state", "supply")
            .and(Filter::gte("weight", 2))
            .and(Filter::any_of("shape", "bucket"));

        assert_eq!(
            translate_filter(&expr).unwrap(),
            doc! {
                "$and": [
                    { "state": { "$eq": "supply" } },
                    { "weight": { "$gte": 2 } },
                    { "shape": { "$in": ["bucket"] } },
                ]
            }
        );
    }

    #[test]
    fn negation_uses_nor() {
        let expr = Filter::eq("state", "stop").not();
        assert_eq!(
            translate_filter(&expr).unwrap(),
            doc! { "$nor": [{ "state": { "$eq": "stop" } }] }
        );
    }

    #[test]
    fn text_operators_match_literally() {
        assert_eq!(
            translate_filter(&Filter::starts_with("name", "a.b")).unwrap(),
            doc! { "name": { "$regex": "^a\\.b" } }
        );
        assert!(translate_filter(&Filter::ends_with("name", 1)).is_err());
    }

    #[test]
    fn pipelines_keep_stage_order() {
        let stages = vec![
            Stage::Match(Filter::eq("typ", "basic")),
            Stage::Sort(vec![Sort::desc("weight"), Sort::asc("name")]),
            Stage::Skip(20),
            Stage::Limit(10),
            Stage::Count("count".into()),
        ];

        assert_eq!(
            translate_pipeline(&stages).unwrap(),
            vec![
                doc! { "$match": { "typ": { "$eq": "basic" } } },
                doc! { "$sort": { "weight": -1, "name": 1 } },
                doc! { "$skip": 20i64 },
                doc! { "$limit": 10i64 },
                doc! { "$count": "count" },
            ]
        );
    }

    #[test]
    fn updates_include_only_used_operators() {
        let update = Update::unset(["bucketheight"]).with_push("records", doc! { "summary": "unset" });
        assert_eq!(
            translate_update(&update),
            doc! {
                "$unset": { "bucketheight": "" },
                "$push": { "records": { "summary": "unset" } },
            }
        );
    }
}
