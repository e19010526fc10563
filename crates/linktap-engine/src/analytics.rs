//! Date-windowed, field-chunked sync for ad-analytics streams.
//!
//! The analytics finder forbids offset pagination and caps requests at
//! 20 fields, so this path walks fixed-size date windows forward from
//! the bookmark and splits the selected fields into capped chunks, then
//! reassembles one wide record per `(pivotValue, start date)` key from
//! the narrow per-chunk responses.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use linktap_client::ApiClient;
use linktap_types::error::Result;
use linktap_types::stream::StreamDefinition;
use serde_json::Value;

use crate::pagination::build_url;
use crate::records::{process_records, RecordBatch};
use crate::sink::RecordSink;
use crate::transform::{format_instant, parse_instant, snake_to_camel, transform_records};

/// The API rejects requests with more than 20 fields; capping chunks at
/// 17 always leaves room for the three mandatory dimension fields.
const MAX_CHUNK_LENGTH: usize = 17;

/// Dimension fields every chunk must carry so responses stay mergeable
/// and the API's non-null-day behavior is triggered.
const MANDATORY_FIELDS: [&str; 3] = ["dateRange", "pivot", "pivotValue"];

/// Days re-read behind the bookmark to absorb upstream data
/// finalization lag.
const LOOKBACK_DAYS: i64 = 7;

/// Split the selected fields into request chunks.
///
/// Fields arrive snake_case from the catalog and are camelized for the
/// request; fields the finder rejects are dropped. A mandatory-only
/// zeroth chunk is always present, and every chunk is padded with the
/// mandatory dimension fields it is missing.
#[must_use]
pub fn field_chunks(selected_fields: &[String], excluded: &[&str]) -> Vec<Vec<String>> {
    let valid: Vec<String> = selected_fields
        .iter()
        .map(|field| snake_to_camel(field))
        .filter(|field| !excluded.contains(&field.as_str()))
        .collect();

    let mut chunks: Vec<Vec<String>> = vec![Vec::new()];
    chunks.extend(valid.chunks(MAX_CHUNK_LENGTH).map(<[String]>::to_vec));
    for chunk in &mut chunks {
        for field in MANDATORY_FIELDS {
            if !chunk.iter().any(|f| f == field) {
                chunk.push(field.to_string());
            }
        }
    }
    chunks
}

/// Indexed `dateRange.*` query parameters for one window.
#[must_use]
pub fn date_range_params(start: NaiveDate, end: NaiveDate) -> Vec<(String, String)> {
    use chrono::Datelike;
    vec![
        ("dateRange.start.day".into(), start.day().to_string()),
        ("dateRange.start.month".into(), start.month().to_string()),
        ("dateRange.start.year".into(), start.year().to_string()),
        ("dateRange.end.day".into(), end.day().to_string()),
        ("dateRange.end.month".into(), end.month().to_string()),
        ("dateRange.end.year".into(), end.year().to_string()),
    ]
}

/// Move the window forward: the old end becomes the new start, the new
/// end is capped at today.
#[must_use]
pub fn shift_window(current_end: NaiveDate, today: NaiveDate, window_days: u32) -> (NaiveDate, NaiveDate) {
    let new_end = (current_end + Duration::days(i64::from(window_days))).min(today);
    (current_end, new_end)
}

/// Merge key for one raw analytics element: `(pivotValue, start date)`.
fn merge_key(element: &Value) -> Option<(String, String)> {
    let pivot_value = element.get("pivotValue")?.as_str()?.to_string();
    let start = element.get("dateRange")?.get("start")?;
    let (year, month, day) = (
        start.get("year")?.as_i64()?,
        start.get("month")?.as_i64()?,
        start.get("day")?.as_i64()?,
    );
    Some((pivot_value, format!("{year}-{month}-{day}")))
}

/// Reassemble wide records from per-chunk responses.
///
/// Responses sharing a merge key are shallow-merged, later chunks
/// overwriting overlapping field names. Elements without a usable key
/// (malformed pivot or date range) are dropped.
#[must_use]
pub fn merge_responses(responses: &[Vec<Value>]) -> Vec<Value> {
    let mut merged: BTreeMap<(String, String), Value> = BTreeMap::new();
    for page in responses {
        for element in page {
            let Some(key) = merge_key(element) else { continue };
            match merged.get_mut(&key) {
                Some(Value::Object(existing)) => {
                    if let Some(fields) = element.as_object() {
                        for (name, value) in fields {
                            existing.insert(name.clone(), value.clone());
                        }
                    }
                }
                _ => {
                    merged.insert(key, element.clone());
                }
            }
        }
    }
    merged.into_values().collect()
}

/// One analytics stream invocation for one parent record.
pub struct AnalyticsJob<'a> {
    pub def: &'static StreamDefinition,
    /// Stream JSON schema driving coercion.
    pub schema: &'a Value,
    /// Snake-case selected field names from the catalog.
    pub selected_fields: &'a [String],
    /// Static finder params plus the parent-derived campaign filter.
    pub base_params: Vec<(String, String)>,
    /// Bookmark (or start date) for this stream.
    pub last_datetime: String,
    pub date_window_size: u32,
    pub today: NaiveDate,
    /// Parent record identifier injected into emitted records.
    pub parent_id: Option<Value>,
}

/// Run the window sync, returning records emitted and the max bookmark.
///
/// Empty windows advance without emission; they are normal (no ad spend
/// that period), not an error.
///
/// # Errors
///
/// Propagates client, sink, and timestamp-parse failures; any error
/// aborts the remaining windows.
pub fn sync_window_stream(
    client: &dyn ApiClient,
    sink: &dyn RecordSink,
    job: &AnalyticsJob<'_>,
) -> Result<(u64, String)> {
    let def = job.def;
    let lookback_dt = parse_instant(&job.last_datetime)? - Duration::days(LOOKBACK_DAYS);
    let threshold = format_instant(lookback_dt);

    let mut window_start = lookback_dt.date_naive();
    let mut window_end = (window_start + Duration::days(i64::from(job.date_window_size))).min(job.today);

    let chunks = field_chunks(job.selected_fields, def.chunk_excluded_fields);
    let mut max_bookmark = job.last_datetime.clone();
    let mut total = 0u64;

    while window_end <= job.today {
        let mut responses: Vec<Vec<Value>> = Vec::new();
        for chunk in &chunks {
            let mut params: Vec<(String, String)> = vec![("start".into(), "0".into())];
            if let Some(count) = def.page_size_override {
                params.push(("count".into(), count.to_string()));
            }
            params.extend(job.base_params.iter().cloned());
            params.extend(date_range_params(window_start, window_end));
            params.push(("fields".into(), chunk.join(",")));

            let url = build_url(def.path, &params);
            tracing::info!(
                stream = def.name,
                window_start = %window_start,
                window_end = %window_end,
                "Syncing analytics window"
            );
            let page = client.get(&url, &[])?;
            if let Some(elements) = page.get(def.data_key).and_then(Value::as_array) {
                if !elements.is_empty() {
                    responses.push(elements.clone());
                }
            }
        }

        let merged = merge_responses(&responses);
        if merged.is_empty() {
            tracing::info!(stream = def.name, "No records this window");
        } else {
            let transformed = transform_records(&merged, job.schema);
            let batch = RecordBatch {
                def,
                time_extracted: chrono::Utc::now(),
                parent_id: job.parent_id.as_ref(),
            };
            let outcome = process_records(
                &batch,
                transformed,
                &threshold,
                &max_bookmark,
                &mut BTreeSet::new(),
                sink,
            )?;
            total += outcome.records_written;
            max_bookmark = outcome.max_bookmark;
            tracing::info!(
                stream = def.name,
                records = outcome.records_written,
                max_bookmark,
                "Processed analytics window"
            );
        }

        let (new_start, new_end) = shift_window(window_end, job.today, job.date_window_size);
        window_start = new_start;
        window_end = new_end;
        if window_start == window_end {
            break;
        }
    }

    Ok((total, max_bookmark))
}
