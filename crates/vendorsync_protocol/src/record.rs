//! Configuration records.

use crate::codec::{from_cbor, to_cbor};
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named configuration profile ("vendor").
///
/// A record carries an immutable identifier, a display name and an arbitrary
/// set of string fields (credentials, endpoints, model names). Equality is
/// structural: two records are equal when the id, the name and the complete
/// field mapping match. Field order never matters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Creates a record with no fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field, replacing any previous value for the key.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Changes the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns all fields in key order.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Returns the value of one field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Sets a field, returning the previous value.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(key.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove_field(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    /// Returns the keys whose values differ between `self` and `other`,
    /// including keys present on only one side.
    pub fn changed_fields(&self, other: &Record) -> Vec<String> {
        let mut changed: Vec<String> = self
            .fields
            .iter()
            .filter(|(k, v)| other.fields.get(*k) != Some(*v))
            .map(|(k, _)| k.clone())
            .collect();
        changed.extend(
            other
                .fields
                .keys()
                .filter(|k| !self.fields.contains_key(*k))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        to_cbor(self)
    }

    /// Decodes from CBOR.
    ///
    /// Fails on malformed bytes and on records with an empty id.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let record: Record = from_cbor(bytes)?;
        if record.id.is_empty() {
            return Err(ProtocolError::invalid_structure("record id is empty"));
        }
        Ok(record)
    }
}
