//! Catalog model: which streams are selected and which fields to request.
//!
//! The tap consumes a catalog produced elsewhere; this crate only models
//! the parts the sync engine reads (selection flags, field selection, and
//! the JSON schema used for type coercion).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stream's entry in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream name, matching the registry.
    pub stream: String,
    /// Whether the stream's records are emitted.
    #[serde(default)]
    pub selected: bool,
    /// JSON Schema for the stream (drives type coercion).
    #[serde(default)]
    pub schema: Value,
    /// Explicit field selection; `None` selects every schema property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_fields: Option<Vec<String>>,
}

impl CatalogEntry {
    /// Snake-case names of the fields to replicate, in schema order.
    ///
    /// Fields listed in `selected_fields` that the schema does not declare
    /// are ignored; automatic fields (keys, replication key) are expected
    /// to be present in the selection already.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let properties = self
            .schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        match &self.selected_fields {
            None => properties,
            Some(chosen) => {
                let chosen: BTreeSet<_> = chosen.iter().collect();
                properties
                    .into_iter()
                    .filter(|name| chosen.contains(name))
                    .collect()
            }
        }
    }
}

/// The full catalog handed to the tap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// The entry for `stream`, if the catalog lists it.
    #[must_use]
    pub fn entry(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|entry| entry.stream == stream)
    }

    /// Names of all selected streams.
    #[must_use]
    pub fn selected_streams(&self) -> BTreeSet<String> {
        self.streams
            .iter()
            .filter(|entry| entry.selected)
            .map(|entry| entry.stream.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with_schema() -> CatalogEntry {
        CatalogEntry {
            stream: "accounts".into(),
            selected: true,
            schema: json!({
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": ["null", "string"]},
                    "last_modified_time": {"type": "string", "format": "date-time"},
                }
            }),
            selected_fields: None,
        }
    }

    #[test]
    fn field_names_default_to_all_schema_properties() {
        let entry = entry_with_schema();
        assert_eq!(entry.field_names(), vec!["id", "last_modified_time", "name"]);
    }

    #[test]
    fn explicit_selection_filters_and_keeps_schema_order() {
        let mut entry = entry_with_schema();
        entry.selected_fields = Some(vec!["name".into(), "id".into(), "unknown".into()]);
        assert_eq!(entry.field_names(), vec!["id", "name"]);
    }

    #[test]
    fn selected_streams_skips_unselected() {
        let catalog = Catalog {
            streams: vec![
                entry_with_schema(),
                CatalogEntry { stream: "campaigns".into(), ..CatalogEntry::default() },
            ],
        };
        let selected = catalog.selected_streams();
        assert!(selected.contains("accounts"));
        assert!(!selected.contains("campaigns"));
    }
}
