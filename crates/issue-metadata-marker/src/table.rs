//! The decoded marker payload: tenant id to per-tenant record.
//!
//! Tenant ids are kept in the order a JavaScript object would enumerate
//! its own properties: keys that are canonical array indices (`"0"`,
//! `"1"`, `"42"`) come first in ascending numeric order, every other key
//! follows in insertion order. Bodies written by other tools that share
//! the marker format use that ordering, so keeping it makes re-encoded
//! bodies byte-identical to theirs.

use crate::error::{Error, Result};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Flat key/value mapping visible to a single tenant.
pub type MetadataRecord = Map<String, Value>;

/// Ordered mapping from tenant id to that tenant's metadata.
///
/// Entries are stored as raw JSON values so that a malformed entry for one
/// tenant never prevents another tenant from reading or writing its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    entries: Vec<(String, Value)>,
}

/// Returns the numeric value of `key` if it is a canonical array index.
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|&n| n != u32::MAX)
}

impl MetadataTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tenant entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no tenant entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tenant ids in serialization order.
    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(tenant, _)| tenant.as_str())
    }

    /// Iterates over `(tenant, value)` pairs in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(tenant, value)| (tenant.as_str(), value))
    }

    fn position(&self, tenant: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == tenant)
    }

    /// Returns the raw entry stored for `tenant`.
    #[must_use]
    pub fn get(&self, tenant: &str) -> Option<&Value> {
        self.position(tenant).map(|i| &self.entries[i].1)
    }

    /// Returns the record stored for `tenant`.
    ///
    /// A `null` entry counts as no record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnObject`] if the entry exists but is not a JSON
    /// object.
    pub fn record(&self, tenant: &str) -> Result<Option<&MetadataRecord>> {
        match self.get(tenant) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(record)) => Ok(Some(record)),
            Some(_) => Err(Error::NotAnObject {
                tenant: tenant.to_string(),
            }),
        }
    }

    /// Inserts or replaces the entry for `tenant`.
    ///
    /// Replacing keeps the entry's position. Returns the previous value.
    pub fn insert(&mut self, tenant: impl Into<String>, value: Value) -> Option<Value> {
        let tenant = tenant.into();
        if let Some(i) = self.position(&tenant) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.insert_new(tenant, value);
        None
    }

    fn insert_new(&mut self, tenant: String, value: Value) -> usize {
        let at = match array_index(&tenant) {
            Some(n) => self
                .entries
                .iter()
                .position(|(key, _)| array_index(key).is_none_or(|other| other > n))
                .unwrap_or(self.entries.len()),
            None => self.entries.len(),
        };
        self.entries.insert(at, (tenant, value));
        at
    }

    /// Shallow-merges `partial` into the record for `tenant`.
    ///
    /// Keys in `partial` overwrite same-named keys, other keys are kept.
    /// Object values are replaced wholesale, never merged recursively. The
    /// record is created when the tenant has none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAnObject`] if the tenant's existing entry is not a
    /// JSON object. The table is left unchanged in that case.
    pub fn merge(&mut self, tenant: &str, partial: MetadataRecord) -> Result<&MetadataRecord> {
        let index = match self.position(tenant) {
            Some(i) => i,
            None => self.insert_new(tenant.to_string(), Value::Null),
        };

        let slot = &mut self.entries[index].1;
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(record) = slot else {
            return Err(Error::NotAnObject {
                tenant: tenant.to_string(),
            });
        };

        for (key, value) in partial {
            record.insert(key, value);
        }
        Ok(record)
    }
}

impl FromIterator<(String, Value)> for MetadataTable {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (tenant, value) in iter {
            table.insert(tenant, value);
        }
        table
    }
}

impl From<Map<String, Value>> for MetadataTable {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl Serialize for MetadataTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (tenant, value) in self.iter() {
            map.serialize_entry(tenant, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetadataTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}
