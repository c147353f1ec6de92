//! Applies [`Update`] descriptions to stored documents.

use bson::{Bson, Document};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, ID_FIELD},
    update::Update,
};

/// Assigns `value` at a dotted path, creating intermediate documents.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot set {path}: {head} is not a document"
                ))),
            }
        }
    }
}

/// Removes the value at a dotted path. Missing paths are ignored.
pub(crate) fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn get_path_mut<'a>(document: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => document.get_mut(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(inner) => get_path_mut(inner, rest),
            _ => None,
        },
    }
}

/// Applies `update` in place and reports whether the document changed.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] when the update would change
/// the identity, or pushes onto a field that is not an array.
pub(crate) fn apply_update(document: &mut Document, update: &Update) -> DocumentStoreResult<bool> {
    let before = document.clone();

    for (path, value) in &update.set {
        if path == ID_FIELD && document.get(ID_FIELD).is_some_and(|id| id != value) {
            return Err(DocumentStoreError::InvalidDocument(
                "the _id field is immutable".to_string(),
            ));
        }
        set_path(document, path, value.clone())?;
    }

    for path in &update.unset {
        remove_path(document, path);
    }

    for (path, value) in &update.push {
        match get_path_mut(document, path) {
            Some(Bson::Array(items)) => items.push(value.clone()),
            Some(_) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot push onto {path}: not an array"
                )));
            }
            None => set_path(document, path, Bson::Array(vec![value.clone()]))?,
        }
    }

    Ok(*document != before)
}

/// Builds the starting document of an upsert from the equality terms of a filter.
pub(crate) fn seed_from_filter(filter: &Expr) -> DocumentStoreResult<Document> {
    fn collect(expr: &Expr, seed: &mut Document) -> DocumentStoreResult<()> {
        match expr {
            Expr::Field { field, op: FieldOp::Eq, value } => set_path(seed, field, value.clone()),
            Expr::And(terms) => terms.iter().try_for_each(|term| collect(term, seed)),
            _ => Ok(()),
        }
    }

    let mut seed = Document::new();
    collect(filter, &mut seed)?;
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmodel_core::query::Filter;

    #[test]
    fn set_reaches_nested_paths() {
        let mut document = doc! { "volume": { "length": 1 } };
        let changed = apply_update(
            &mut document,
            &Update::set(doc! { "volume.width": 3, "name": "box" }),
        )
        .unwrap();

        assert!(changed);
        assert_eq!(document, doc! { "volume": { "length": 1, "width": 3 }, "name": "box" });
    }

    #[test]
    fn push_creates_then_appends() {
        let mut document = doc! {};
        let update = Update::default().with_push("records", doc! { "summary": "a" });
        apply_update(&mut document, &update).unwrap();
        apply_update(&mut document, &update).unwrap();

        assert_eq!(document.get_array("records").unwrap().len(), 2);
    }

    #[test]
    fn unchanged_documents_are_not_modified() {
        let mut document = doc! { "name": "box" };
        let changed = apply_update(&mut document, &Update::set(doc! { "name": "box" })).unwrap();
        assert!(!changed);

        let changed = apply_update(&mut document, &Update::unset(["missing"])).unwrap();
        assert!(!changed);
    }

    #[test]
    fn identity_cannot_change() {
        let mut document = doc! { "_id": 1 };
        let err = apply_update(&mut document, &Update::set(doc! { "_id": 2 })).unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn upsert_seed_takes_equalities() {
        let filter = Filter::id(5).and(Filter::eq("meta.owner", "ops")).and(Filter::gt("n", 1));
        assert_eq!(
            seed_from_filter(&filter).unwrap(),
            doc! { "_id": 5, "meta": { "owner": "ops" } }
        );
    }
}
