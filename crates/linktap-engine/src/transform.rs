//! Raw-record normalization.
//!
//! Converts one API record into the shape downstream consumers expect:
//! audit stamps denested, URN references decomposed into numeric id
//! columns, camelCase keys converted to snake_case, analytics date
//! ranges flattened to `start_at`/`end_at`, and integer-millisecond
//! timestamps coerced to RFC 3339 per the stream's JSON schema.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use linktap_types::error::{Result, TapError};
use serde_json::{Map, Value};

/// Sub-second RFC 3339 shape used for all emitted timestamps.
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Parse an RFC 3339 timestamp into a canonical instant.
///
/// Tolerates mixed fractional-second precision; bookmark comparison is
/// always done on parsed instants, never lexically.
///
/// # Errors
///
/// Returns [`TapError::Decode`] for non-RFC 3339 input.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| TapError::Decode(format!("invalid timestamp '{value}': {err}")))
}

/// Render an instant in the canonical emitted shape.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.format(DATETIME_FMT).to_string()
}

/// Convert epoch milliseconds to the canonical emitted shape.
#[must_use]
pub fn millis_to_rfc3339(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(format_instant)
}

/// camelCase (or PascalCase) to snake_case.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// snake_case to camelCase, for request field parameters.
#[must_use]
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, part) in name.split('_').enumerate() {
        if i == 0 {
            out.push_str(part);
        } else {
            let mut chars = part.chars();
            if let Some(first) = chars.next() {
                out.push(first.to_ascii_uppercase());
                out.extend(chars);
            }
        }
    }
    out
}

/// Final segment of a `urn:li:<type>:<id>` string.
fn urn_id(urn: &str) -> Option<&str> {
    urn.rsplit(':').next().filter(|id| !id.is_empty())
}

/// `<type>` segment of a `urn:li:<type>:<id>` string.
fn urn_type(urn: &str) -> Option<&str> {
    let mut parts = urn.split(':');
    if parts.next() != Some("urn") || parts.next() != Some("li") {
        return None;
    }
    parts.next()
}

fn urn_id_value(urn: &str) -> Option<Value> {
    let id = urn_id(urn)?;
    Some(id.parse::<u64>().map_or_else(|_| Value::String(id.to_string()), Value::from))
}

/// Copy `changeAuditStamps.{created,lastModified}.time` up to flat
/// millisecond fields so schema coercion can see them.
fn denest_audit_stamps(obj: &mut Map<String, Value>) {
    let Some(stamps) = obj.remove("changeAuditStamps") else {
        return;
    };
    for (node, target) in [("created", "createdTime"), ("lastModified", "lastModifiedTime")] {
        if let Some(time) = stamps.get(node).and_then(|n| n.get("time")) {
            obj.insert(target.to_string(), time.clone());
        }
    }
}

/// Derive `<field>_id` columns from URN-valued fields.
///
/// The original URN field is kept alongside the derived column. Operates
/// on snake_case keys (runs after key conversion).
fn decompose_urns(obj: &mut Map<String, Value>) {
    let mut additions: Vec<(String, Value)> = Vec::new();
    for (key, value) in obj.iter() {
        let Some(urn) = value.as_str() else { continue };
        if !urn.starts_with("urn:li:") {
            continue;
        }
        let target = match (key.as_str(), urn_type(urn)) {
            ("account", _) => Some("account_id"),
            ("campaign", _) => Some("campaign_id"),
            ("creative", _) => Some("creative_id"),
            ("campaign_group", _) => Some("campaign_group_id"),
            ("reference", Some("organization")) => Some("reference_organization_id"),
            ("reference", Some("person")) => Some("reference_person_id"),
            ("user", Some("person")) => Some("user_person_id"),
            ("pivot_value", Some("sponsoredCampaign")) => Some("campaign_id"),
            ("pivot_value", Some("sponsoredCreative")) => Some("creative_id"),
            _ => None,
        };
        if let (Some(target), Some(id)) = (target, urn_id_value(urn)) {
            additions.push((target.to_string(), id));
        }
    }
    for (key, value) in additions {
        obj.entry(key).or_insert(value);
    }
}

/// Flatten an analytics `date_range` node into `start_at`/`end_at`
/// midnight instants.
fn flatten_date_range(obj: &mut Map<String, Value>) {
    let Some(range) = obj.get("date_range") else {
        return;
    };
    let mut stamps = Vec::new();
    for (node, target) in [("start", "start_at"), ("end", "end_at")] {
        let Some(date) = range.get(node) else { continue };
        let (Some(year), Some(month), Some(day)) = (
            date.get("year").and_then(Value::as_i64),
            date.get("month").and_then(Value::as_i64),
            date.get("day").and_then(Value::as_i64),
        ) else {
            continue;
        };
        #[allow(clippy::cast_possible_truncation)]
        let parsed = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32);
        if let Some(date) = parsed {
            let instant = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default());
            stamps.push((target, format_instant(instant)));
        }
    }
    for (target, stamp) in stamps {
        obj.entry(target.to_string()).or_insert(Value::String(stamp));
    }
}

fn convert_keys(value: Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(key, val)| (camel_to_snake(&key), convert_keys(val)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(convert_keys).collect()),
        other => other,
    }
}

/// Coerce record fields per the stream schema: integer values under a
/// `format: date-time` property become RFC 3339 strings.
fn coerce_with_schema(obj: &mut Map<String, Value>, schema: &Value) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (field, prop) in properties {
        if prop.get("format").and_then(Value::as_str) != Some("date-time") {
            continue;
        }
        let Some(value) = obj.get(field) else { continue };
        if let Some(millis) = value.as_i64() {
            if let Some(stamp) = millis_to_rfc3339(millis) {
                obj.insert(field.clone(), Value::String(stamp));
            }
        }
    }
}

/// Normalize one raw API record against the stream's JSON schema.
#[must_use]
pub fn transform_record(raw: &Value, schema: &Value) -> Value {
    let mut record = raw.clone();
    if let Some(obj) = record.as_object_mut() {
        denest_audit_stamps(obj);
    }
    let mut record = convert_keys(record);
    if let Some(obj) = record.as_object_mut() {
        decompose_urns(obj);
        flatten_date_range(obj);
        coerce_with_schema(obj, schema);
    }
    record
}

/// Normalize every record of a page.
#[must_use]
pub fn transform_records(raw: &[Value], schema: &Value) -> Vec<Value> {
    raw.iter().map(|record| transform_record(record, schema)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_to_snake_handles_acronym_runs() {
        assert_eq!(camel_to_snake("lastModifiedTime"), "last_modified_time");
        assert_eq!(camel_to_snake("pivotValue"), "pivot_value");
        assert_eq!(camel_to_snake("costInUSD"), "cost_in_usd");
        assert_eq!(camel_to_snake("id"), "id");
    }

    #[test]
    fn snake_to_camel_roundtrips_field_names() {
        assert_eq!(snake_to_camel("last_modified_time"), "lastModifiedTime");
        assert_eq!(snake_to_camel("clicks"), "clicks");
        assert_eq!(snake_to_camel("cost_in_local_currency"), "costInLocalCurrency");
    }

    #[test]
    fn audit_stamps_denest_to_flat_times() {
        let raw = json!({
            "id": 1,
            "changeAuditStamps": {
                "created": {"time": 1_700_000_000_000_i64},
                "lastModified": {"time": 1_700_086_400_000_i64}
            }
        });
        let schema = json!({"properties": {
            "created_time": {"type": "string", "format": "date-time"},
            "last_modified_time": {"type": "string", "format": "date-time"}
        }});
        let out = transform_record(&raw, &schema);
        assert!(out.get("change_audit_stamps").is_none());
        assert_eq!(out["created_time"], "2023-11-14T22:13:20.000000Z");
        assert_eq!(out["last_modified_time"], "2023-11-15T22:13:20.000000Z");
    }

    #[test]
    fn urn_fields_gain_id_columns() {
        let raw = json!({
            "campaign": "urn:li:sponsoredCampaign:123",
            "reference": "urn:li:organization:456"
        });
        let out = transform_record(&raw, &json!({}));
        assert_eq!(out["campaign"], "urn:li:sponsoredCampaign:123");
        assert_eq!(out["campaign_id"], 123);
        assert_eq!(out["reference_organization_id"], 456);
    }

    #[test]
    fn person_reference_is_not_treated_as_organization() {
        let raw = json!({"reference": "urn:li:person:abc"});
        let out = transform_record(&raw, &json!({}));
        assert!(out.get("reference_organization_id").is_none());
        assert_eq!(out["reference_person_id"], "abc");
    }

    #[test]
    fn pivot_value_maps_to_pivot_specific_id() {
        let raw = json!({"pivotValue": "urn:li:sponsoredCreative:987"});
        let out = transform_record(&raw, &json!({}));
        assert_eq!(out["creative_id"], 987);
        assert!(out.get("campaign_id").is_none());
    }

    #[test]
    fn date_range_flattens_to_start_and_end_instants() {
        let raw = json!({
            "dateRange": {
                "start": {"year": 2024, "month": 6, "day": 1},
                "end": {"year": 2024, "month": 6, "day": 2}
            }
        });
        let out = transform_record(&raw, &json!({}));
        assert_eq!(out["start_at"], "2024-06-01T00:00:00.000000Z");
        assert_eq!(out["end_at"], "2024-06-02T00:00:00.000000Z");
        assert!(out.get("date_range").is_some());
    }

    #[test]
    fn schema_coercion_only_touches_date_time_integers() {
        let raw = json!({"lastModifiedAt": 1_700_000_000_000_i64, "clicks": 42});
        let schema = json!({"properties": {
            "last_modified_at": {"type": "string", "format": "date-time"},
            "clicks": {"type": "integer"}
        }});
        let out = transform_record(&raw, &schema);
        assert_eq!(out["last_modified_at"], "2023-11-14T22:13:20.000000Z");
        assert_eq!(out["clicks"], 42);
    }

    #[test]
    fn parse_instant_tolerates_mixed_precision() {
        let a = parse_instant("2024-01-01T00:00:00Z").unwrap();
        let b = parse_instant("2024-01-01T00:00:00.000000Z").unwrap();
        assert_eq!(a, b);
        let c = parse_instant("2024-01-01T00:00:00.5Z").unwrap();
        assert!(c > a);
        assert!(parse_instant("not-a-date").is_err());
    }
}
