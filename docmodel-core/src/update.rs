//! Field-level update descriptions.

use bson::{Bson, Document};

/// A partial update applied to every matched document.
///
/// `set` assigns fields, `unset` removes them and `push` appends one value to
/// each named array field. Dotted names address nested documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Document,
    pub unset: Vec<String>,
    pub push: Document,
}

impl Update {
    /// An update assigning the given fields.
    pub fn set(fields: Document) -> Self {
        Self { set: fields, ..Self::default() }
    }

    /// An update removing the given fields.
    pub fn unset(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            unset: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Appends `value` to the array stored under `field`.
    pub fn with_push(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.push.is_empty()
    }
}
