//! Aggregation pipeline execution over in-memory rows.

use bson::{Bson, Document};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    pipeline::Stage,
    query::ID_FIELD,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents, lookup},
    update::{remove_path, set_path},
};

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Reshapes a row by an inclusion or exclusion projection.
///
/// The projection is an inclusion when any field other than `_id` is included.
/// Inclusions keep `_id` unless it is excluded explicitly.
pub(crate) fn project(row: &Document, projection: &Document) -> DocumentStoreResult<Document> {
    let inclusion = projection
        .iter()
        .any(|(field, value)| field != ID_FIELD && truthy(value));

    if !inclusion {
        let mut out = row.clone();
        for (field, _) in projection.iter().filter(|(_, value)| !truthy(value)) {
            remove_path(&mut out, field);
        }
        return Ok(out);
    }

    let mut out = Document::new();
    let keep_id = projection.get(ID_FIELD).is_none_or(truthy);
    if keep_id {
        if let Some(id) = row.get(ID_FIELD) {
            out.insert(ID_FIELD, id.clone());
        }
    }
    for (field, value) in projection {
        if field == ID_FIELD || !truthy(value) {
            continue;
        }
        if let Some(found) = lookup(row, field) {
            set_path(&mut out, field, found.clone())?;
        }
    }
    Ok(out)
}

/// Runs `stages` in order over `rows`.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Unsupported`] for [`Stage::Raw`].
pub(crate) fn run_pipeline(mut rows: Vec<Document>, stages: &[Stage]) -> DocumentStoreResult<Vec<Document>> {
    for stage in stages {
        rows = match stage {
            Stage::Match(expr) => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if DocumentEvaluator::matches(&row, expr)? {
                        kept.push(row);
                    }
                }
                kept
            }
            Stage::Sort(keys) => {
                rows.sort_by(|a, b| compare_documents(a, b, keys));
                rows
            }
            Stage::Skip(n) => rows.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => rows.into_iter().take(*n as usize).collect(),
            Stage::Count(field) => {
                if rows.is_empty() {
                    Vec::new()
                } else {
                    let count = i32::try_from(rows.len())
                        .map(Bson::Int32)
                        .unwrap_or(Bson::Int64(rows.len() as i64));
                    let mut row = Document::new();
                    row.insert(field.as_str(), count);
                    vec![row]
                }
            }
            Stage::Project(projection) => rows
                .iter()
                .map(|row| project(row, projection))
                .collect::<DocumentStoreResult<_>>()?,
            Stage::Raw(raw) => {
                return Err(DocumentStoreError::Unsupported(format!(
                    "raw pipeline stage {raw} in the in-memory store"
                )));
            }
        };
    }
    Ok(rows)
}
