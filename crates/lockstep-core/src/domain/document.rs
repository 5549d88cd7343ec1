//! The shared document.
//!
//! Serialized form: `{"data": {"1": 1, "2": 1}}`. Stores treat the JSON as an
//! opaque string; only this module knows its shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::EntryId;

/// Value every merged entry is set to.
pub const MARKER: i64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub data: BTreeMap<EntryId, i64>,
}

impl Document {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Document holding `ids`, each set to [`MARKER`].
    pub fn seeded<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = EntryId>,
    {
        Self {
            data: ids.into_iter().map(|id| (id, MARKER)).collect(),
        }
    }

    /// Returns a copy with `id` set to [`MARKER`]. `self` is untouched.
    ///
    /// This is the whole merge step of an update: synchronous, no I/O.
    pub fn with_entry(&self, id: &EntryId) -> Self {
        let mut data = self.data.clone();
        data.insert(id.clone(), MARKER);
        Self { data }
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.data.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_entry_does_not_mutate_original() {
        let doc = Document::seeded([EntryId::from(1)]);
        let merged = doc.with_entry(&EntryId::from(2));

        assert_eq!(doc.len(), 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.data.get(&EntryId::from(2)), Some(&MARKER));
    }

    #[test]
    fn with_entry_is_idempotent_per_id() {
        let doc = Document::empty()
            .with_entry(&EntryId::from(7))
            .with_entry(&EntryId::from(7));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn serialized_shape_wraps_mapping_in_data_field() {
        let doc = Document::seeded([EntryId::from(1)]);
        let json = doc.to_json().unwrap();
        assert_eq!(json, r#"{"data":{"1":1}}"#);
    }

    #[test]
    fn parses_document_written_by_other_clients() {
        let doc = Document::from_json(r#"{"data":{"1":1,"2":1,"abc":1}}"#).unwrap();
        assert_eq!(doc.len(), 3);
        assert!(doc.contains(&EntryId::new("abc")));
    }

    #[test]
    fn missing_data_field_is_an_empty_mapping() {
        let doc = Document::from_json("{}").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn rejects_non_document_json() {
        assert!(Document::from_json("[1,2,3]").is_err());
        assert!(Document::from_json("not json").is_err());
    }
}
