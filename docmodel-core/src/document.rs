//! Capability contract for stored document kinds.
//!
//! The model engine never inspects the fields of a document. Everything it needs
//! to know (collection, identity, indexes, audit log) is reported through the
//! traits in this module, and everything else travels as serde-serialized BSON.

use bson::{Bson, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    audit::{Actor, AuditEntry, AuditLog},
    error::DocumentStoreResult,
    pipeline::Pipeline,
    query::{Expr, ID_FIELD, SortDirection},
};

/// Summary recorded on the entry stamped when a document is first saved.
pub const CREATE_SUMMARY: &str = "create";

/// Names the collection a kind is stored in.
pub trait Collection {
    /// Returns the name of the collection this kind belongs to.
    ///
    /// This should be a static identifier (e.g., "users", "stockproduct").
    fn collection_name() -> &'static str;
}

/// Core trait that all documents handled by the model must implement.
///
/// Identity is exposed as a [`Bson`] value so kinds can key on whatever the
/// database uses (`ObjectId`, strings, integers). A document that has not been
/// stored yet reports [`Bson::Null`].
///
/// # Example
///
/// ```ignore
/// use bson::{Bson, oid::ObjectId};
/// use docmodel::document::{Collection, Document, IndexSpec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<ObjectId>,
///     pub email: String,
/// }
///
/// impl Collection for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
///
/// impl Document for User {
///     fn id(&self) -> Bson {
///         self.id.map(Bson::ObjectId).unwrap_or(Bson::Null)
///     }
///
///     fn set_id(&mut self, id: Bson) {
///         if let Bson::ObjectId(oid) = id {
///             self.id = Some(oid);
///         }
///     }
///
///     fn indexes() -> Vec<IndexSpec> {
///         vec![IndexSpec::ascending("email").unique()]
///     }
/// }
/// ```
pub trait Document: Collection + Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns this document's identity, or [`Bson::Null`] when none is assigned.
    fn id(&self) -> Bson;

    /// Stores an identity assigned by the backend.
    fn set_id(&mut self, id: Bson);

    /// Indexes to create together with the collection.
    fn indexes() -> Vec<IndexSpec> {
        Vec::new()
    }

    /// Decodes a stored record.
    ///
    /// Kinds that resolve their shape at read time override this so their own
    /// errors reach the caller unchanged.
    fn from_raw(raw: bson::Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(raw)?)
    }

    /// Mutable access to the audit log, for kinds that keep one.
    fn audit_log(&mut self) -> Option<&mut AuditLog> {
        None
    }

    /// Appends one entry to the audit log and returns the updated log.
    ///
    /// Returns `None` and records nothing for kinds without an audit log.
    fn record_audit(&mut self, actor: &dyn Actor, summary: &str) -> Option<&AuditLog> {
        let log = self.audit_log()?;
        log.append(AuditEntry::new(actor, summary));
        Some(log)
    }

    /// Records the creation entry.
    fn stamp(&mut self, actor: &dyn Actor) {
        self.record_audit(actor, CREATE_SUMMARY);
    }
}

/// Serialization helpers available on every [`Document`].
pub trait DocumentExt: Document {
    /// Serializes the document into the BSON body sent to the backend.
    ///
    /// A null `_id` is removed so the backend assigns one.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the kind does not serialize to a document.
    fn payload(&self) -> DocumentStoreResult<bson::Document>;
}

impl<D: Document> DocumentExt for D {
    fn payload(&self) -> DocumentStoreResult<bson::Document> {
        let mut body = serialize_to_document(self)?;
        if matches!(body.get(ID_FIELD), Some(Bson::Null)) {
            body.remove(ID_FIELD);
        }
        Ok(body)
    }
}

/// A kind whose rows are produced by an aggregation pipeline.
///
/// The pipeline is built from the handle itself (so it may carry parameters)
/// and the caller's filter.
pub trait Aggregate: Collection + DeserializeOwned + Send + Sync + 'static {
    /// Builds the pipeline run against [`Collection::collection_name`].
    fn pipeline(&self, filter: &Expr) -> Pipeline;
}

/// Declaration of one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Ordered key fields.
    pub keys: Vec<(String, SortDirection)>,
    /// Whether the index rejects duplicate keys.
    pub unique: bool,
    /// Explicit index name; backends derive one from the keys otherwise.
    pub name: Option<String>,
}

impl IndexSpec {
    /// Starts an index on `field` in ascending order.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::on(field, SortDirection::Asc)
    }

    /// Starts an index on `field` in descending order.
    pub fn descending(field: impl Into<String>) -> Self {
        Self::on(field, SortDirection::Desc)
    }

    fn on(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            keys: vec![(field.into(), direction)],
            unique: false,
            name: None,
        }
    }

    /// Adds another key field.
    pub fn and(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The explicit name, or one derived as `field_dir` pairs joined by `_`.
    pub fn index_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .keys
                .iter()
                .map(|(field, dir)| format!("{field}_{}", dir.as_i32()))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// The key fields without their directions.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(field, _)| field.as_str())
    }
}

/// A collection and the indexes it is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, indexes: Vec<IndexSpec>) -> Self {
        Self { name: name.into(), indexes }
    }

    /// The collection and indexes declared by a document kind.
    pub fn of<D: Document>() -> Self {
        Self::new(D::collection_name(), D::indexes())
    }
}
