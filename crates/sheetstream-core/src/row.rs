//! Row records
//!
//! A [`RowRecord`] is one worksheet row as an ordered set of (key, value)
//! pairs. Keys are stringified positional indices ("0", "1", ...) or header
//! names depending on how the scan was configured; either way key order is
//! the column order of the sheet.

use crate::cell::{CellValue, SharedString};

/// One row of a sheet, keyed per column
///
/// Records are dense with respect to the keys they were built with: a column
/// that had no cell in the markup is still present, holding
/// [`CellValue::Empty`]. Duplicate keys are possible with malformed header
/// rows; [`get`](Self::get) returns the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    entries: Vec<(SharedString, CellValue)>,
}

impl RowRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record with the given keys, every value empty
    pub fn with_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = SharedString>,
    {
        Self {
            entries: keys.into_iter().map(|k| (k, CellValue::Empty)).collect(),
        }
    }

    /// Append a (key, value) pair as the last column
    pub fn push(&mut self, key: SharedString, value: CellValue) {
        self.entries.push((key, value));
    }

    /// Get the value for a key, if present (first match on duplicates)
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// Get the value in column order position `index`
    pub fn get_index(&self, index: usize) -> Option<&CellValue> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// Mutable access to the value at position `index`
    pub fn value_mut(&mut self, index: usize) -> Option<&mut CellValue> {
        self.entries.get_mut(index).map(|(_, v)| v)
    }

    /// Iterate over (key, value) pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&SharedString, &CellValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterate over keys in column order
    pub fn keys(&self) -> impl Iterator<Item = &SharedString> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterate over values in column order
    pub fn values(&self) -> impl Iterator<Item = &CellValue> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Number of columns in the record
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the record has no columns at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if every value in the record is absent
    pub fn is_blank(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_empty())
    }
}

impl IntoIterator for RowRecord {
    type Item = (SharedString, CellValue);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RowRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}
