//! Polymorphic documents: one collection, several payload shapes.
//!
//! A stored record carries a discriminator among its common fields. Decoding
//! happens in two passes: the common projection is read first, then the kind's
//! [`Polymorphic::select`] looks at the discriminator and decodes the record a
//! second time into the matching variant. The result is wrapped in an
//! [`Envelope`] that carries the identity and implements [`Document`], so the
//! model can store it like any other kind.

use bson::{Bson, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de, de::DeserializeOwned, ser};

use crate::{
    document::{Collection, Document, IndexSpec},
    error::DocumentStoreResult,
    query::ID_FIELD,
};

/// A family of payload shapes stored in one collection.
pub trait Polymorphic: Serialize + Sized + Send + Sync + Clone + 'static {
    /// Fields shared by every shape, including the discriminator.
    type Common: DeserializeOwned;

    /// The collection holding every shape of the family.
    fn collection_name() -> &'static str;

    /// The discriminator value of this payload.
    fn kind(&self) -> &str;

    /// Picks the shape named by `common` and decodes its specific fields from `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownKind`](crate::error::DocumentStoreError::UnknownKind)
    /// when the discriminator names no shape.
    fn select(common: Self::Common, raw: &bson::Document) -> DocumentStoreResult<Self>;

    /// Indexes created with the collection.
    fn indexes() -> Vec<IndexSpec> {
        Vec::new()
    }
}

/// A polymorphic payload together with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<P> {
    pub id: Bson,
    pub payload: P,
}

impl<P: Polymorphic> Envelope<P> {
    /// Wraps a payload that has not been stored yet.
    pub fn new(payload: P) -> Self {
        Self { id: Bson::Null, payload }
    }

    /// Resolves a stored record into its concrete shape.
    pub fn from_document(raw: bson::Document) -> DocumentStoreResult<Self> {
        let id = raw.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        let common: P::Common = deserialize_from_document(raw.clone())?;
        let payload = P::select(common, &raw)?;
        Ok(Self { id, payload })
    }

    /// The stored form: `_id` first (when assigned), then the payload fields.
    pub fn to_document(&self) -> DocumentStoreResult<bson::Document> {
        let mut out = bson::Document::new();
        if self.id != Bson::Null {
            out.insert(ID_FIELD, self.id.clone());
        }
        for (key, value) in serialize_to_document(&self.payload)? {
            if key != ID_FIELD {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    pub fn kind(&self) -> &str {
        self.payload.kind()
    }
}

impl<P: Polymorphic> Serialize for Envelope<P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document()
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de, P: Polymorphic> Deserialize<'de> for Envelope<P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = bson::Document::deserialize(deserializer)?;
        Self::from_document(raw).map_err(de::Error::custom)
    }
}

impl<P: Polymorphic> Collection for Envelope<P> {
    fn collection_name() -> &'static str {
        P::collection_name()
    }
}

impl<P: Polymorphic> Document for Envelope<P> {
    fn id(&self) -> Bson {
        self.id.clone()
    }

    fn set_id(&mut self, id: Bson) {
        self.id = id;
    }

    fn indexes() -> Vec<IndexSpec> {
        P::indexes()
    }

    fn from_raw(raw: bson::Document) -> DocumentStoreResult<Self> {
        Self::from_document(raw)
    }
}
