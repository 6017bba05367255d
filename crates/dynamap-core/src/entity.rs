//! Decoded records with their key values.

use std::ops::Deref;

use dynamap_model::AttributeValue;

/// A record read from the store, together with the key it is stored under.
///
/// One stored item of an array-shaped model yields several entities sharing
/// the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<T> {
    record: T,
    pk: Option<AttributeValue>,
    sk: Option<AttributeValue>,
}

impl<T> Entity<T> {
    /// Build an entity from a decoded record and its key values.
    #[must_use]
    pub fn new(record: T, pk: Option<AttributeValue>, sk: Option<AttributeValue>) -> Self {
        Self { record, pk, sk }
    }

    /// The partition key value of the stored item.
    #[must_use]
    pub fn pk(&self) -> Option<&AttributeValue> {
        self.pk.as_ref()
    }

    /// The sort key value of the stored item.
    #[must_use]
    pub fn sk(&self) -> Option<&AttributeValue> {
        self.sk.as_ref()
    }

    /// The record.
    #[must_use]
    pub fn record(&self) -> &T {
        &self.record
    }

    /// Take the record, dropping the key values.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.record
    }
}

impl<T> Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}
