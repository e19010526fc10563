//! Page-level record processing: threshold filtering, bookmark
//! advancement, and emission.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use linktap_types::error::Result;
use linktap_types::stream::{BookmarkStyle, StreamDefinition};
use serde_json::Value;

use crate::sink::RecordSink;
use crate::transform::parse_instant;

/// Context shared by every record of one page or window.
pub struct RecordBatch<'a> {
    pub def: &'static StreamDefinition,
    /// Extraction timestamp captured once per page, not per record.
    pub time_extracted: DateTime<Utc>,
    /// Parent record identifier to inject as `<parent>_id`.
    pub parent_id: Option<&'a Value>,
}

/// Result of processing one page of records.
pub struct BatchOutcome {
    /// Running maximum replication-key value after this page.
    pub max_bookmark: String,
    /// Records actually emitted (at or past the threshold).
    pub records_written: u64,
}

/// Transform-filter-emit one page of already-normalized records.
///
/// Records at or past `last_datetime` are emitted (inclusive: boundary
/// records reappear across runs and are absorbed by downstream upsert).
/// The returned max bookmark only moves forward, compared as parsed
/// instants. Seen-set streams emit unconditionally and record their
/// composite key in `seen`.
///
/// # Errors
///
/// Propagates sink failures and unparseable replication-key values.
pub fn process_records(
    batch: &RecordBatch<'_>,
    records: Vec<Value>,
    last_datetime: &str,
    max_bookmark_value: &str,
    seen: &mut BTreeSet<Vec<String>>,
    sink: &dyn RecordSink,
) -> Result<BatchOutcome> {
    let def = batch.def;
    let last_dt = parse_instant(last_datetime)?;
    let mut max_value = max_bookmark_value.to_string();
    let mut max_dt = parse_instant(max_bookmark_value)?;
    let mut written = 0u64;

    for mut record in records {
        if let (Some(parent), Some(parent_id)) = (def.parent, batch.parent_id) {
            if let Some(obj) = record.as_object_mut() {
                obj.insert(format!("{parent}_id"), parent_id.clone());
            }
        }

        if def.bookmark_style == BookmarkStyle::SeenSet {
            seen.insert(dedup_key(def, &record));
            sink.write_record(def.name, &record, batch.time_extracted)?;
            written += 1;
            continue;
        }

        let bookmark = def
            .replication_key
            .and_then(|field| record.get(field))
            .and_then(Value::as_str);
        match bookmark {
            Some(value) => {
                let record_dt = parse_instant(value)?;
                if record_dt > max_dt {
                    max_dt = record_dt;
                    max_value = value.to_string();
                }
                if record_dt >= last_dt {
                    sink.write_record(def.name, &record, batch.time_extracted)?;
                    written += 1;
                }
            }
            // No replication key on the record: emit unconditionally.
            None => {
                sink.write_record(def.name, &record, batch.time_extracted)?;
                written += 1;
            }
        }
    }

    Ok(BatchOutcome { max_bookmark: max_value, records_written: written })
}

/// Composite dedup key for seen-set streams: the primary-key values in
/// declaration order, stringified.
#[must_use]
pub fn dedup_key(def: &StreamDefinition, record: &Value) -> Vec<String> {
    def.primary_keys
        .iter()
        .map(|field| match record.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use linktap_types::stream::by_name;
    use serde_json::json;

    fn batch(def: &'static StreamDefinition) -> RecordBatch<'static> {
        RecordBatch { def, time_extracted: Utc::now(), parent_id: None }
    }

    #[test]
    fn threshold_is_inclusive_and_max_advances() {
        let def = by_name("accounts").unwrap();
        let sink = CollectingSink::new();
        let records = vec![
            json!({"id": 1, "last_modified_time": "2024-01-01T00:00:00Z"}),
            json!({"id": 2, "last_modified_time": "2024-03-01T00:00:00Z"}),
            json!({"id": 3, "last_modified_time": "2023-12-31T00:00:00Z"}),
        ];
        let out = process_records(
            &batch(def),
            records,
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut BTreeSet::new(),
            &sink,
        )
        .unwrap();
        // Boundary record and newer record emitted; stale record dropped.
        assert_eq!(out.records_written, 2);
        assert_eq!(out.max_bookmark, "2024-03-01T00:00:00Z");
        assert_eq!(sink.records_for("accounts").len(), 2);
    }

    #[test]
    fn comparison_is_instant_based_not_lexical() {
        let def = by_name("accounts").unwrap();
        let sink = CollectingSink::new();
        // Lexically "...00Z" > "...000001Z" is false either way, but mixed
        // precision would misorder under string comparison.
        let records = vec![json!({"id": 1, "last_modified_time": "2024-01-01T00:00:00.000001Z"})];
        let out = process_records(
            &batch(def),
            records,
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut BTreeSet::new(),
            &sink,
        )
        .unwrap();
        assert_eq!(out.records_written, 1);
        assert_eq!(out.max_bookmark, "2024-01-01T00:00:00.000001Z");
    }

    #[test]
    fn missing_replication_key_emits_unconditionally() {
        let def = by_name("accounts").unwrap();
        let sink = CollectingSink::new();
        let out = process_records(
            &batch(def),
            vec![json!({"id": 9})],
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut BTreeSet::new(),
            &sink,
        )
        .unwrap();
        assert_eq!(out.records_written, 1);
        assert_eq!(out.max_bookmark, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn seen_set_stream_records_composite_keys() {
        let def = by_name("account_users").unwrap();
        let sink = CollectingSink::new();
        let mut seen = BTreeSet::new();
        let records = vec![
            json!({"account_id": 1, "user_person_id": "u1"}),
            json!({"account_id": 1, "user_person_id": "u2"}),
            json!({"account_id": 1, "user_person_id": "u1"}),
        ];
        let out = process_records(
            &batch(def),
            records,
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut seen,
            &sink,
        )
        .unwrap();
        // Emission is unconditional; the seen set dedups the bookmark.
        assert_eq!(out.records_written, 3);
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&vec!["1".to_string(), "u1".to_string()]));
    }

    #[test]
    fn parent_id_is_injected_on_child_records() {
        let def = by_name("video_ads").unwrap();
        let sink = CollectingSink::new();
        let parent_id = json!(42);
        let batch = RecordBatch { def, time_extracted: Utc::now(), parent_id: Some(&parent_id) };
        process_records(
            &batch,
            vec![json!({"content_reference": "urn:li:video:1"})],
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut BTreeSet::new(),
            &sink,
        )
        .unwrap();
        let emitted = sink.records_for("video_ads");
        assert_eq!(emitted[0]["accounts_id"], 42);
    }

    #[test]
    fn unparseable_bookmark_value_is_an_error() {
        let def = by_name("accounts").unwrap();
        let sink = CollectingSink::new();
        let result = process_records(
            &batch(def),
            vec![json!({"id": 1, "last_modified_time": "yesterday"})],
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00Z",
            &mut BTreeSet::new(),
            &sink,
        );
        assert!(result.is_err());
    }
}
