//! Hierarchical sync engine.
//!
//! One generic traversal drives every stream in the registry: top-level
//! streams are paged with account filters applied, and each parent
//! record dispatches its active child streams with parent-derived
//! filters. Child bookmarks are accumulated during the parent's
//! traversal and committed only after it completes, so an interrupted
//! parent run never advances a child past data it has not re-walked.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use linktap_client::ApiClient;
use linktap_state::StateStore;
use linktap_types::catalog::{Catalog, CatalogEntry};
use linktap_types::config::TapConfig;
use linktap_types::error::{Result, TapError};
use linktap_types::state::BookmarkValue;
use linktap_types::stream::{by_name, top_level, AccountFilter, BookmarkStyle, StreamDefinition};
use serde_json::Value;

use crate::analytics::{sync_window_stream, AnalyticsJob};
use crate::pagination::{build_url, PageWalker};
use crate::records::{process_records, RecordBatch};
use crate::sink::RecordSink;
use crate::transform::{parse_instant, transform_records};

/// Per-stream record counts for one run.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub totals: BTreeMap<String, u64>,
}

impl SyncSummary {
    fn add(&mut self, stream: &str, records: u64) {
        *self.totals.entry(stream.to_string()).or_insert(0) += records;
    }

    /// Records emitted across all streams.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.totals.values().sum()
    }
}

/// Drives one full sync over the selected streams.
pub struct SyncEngine<'a> {
    client: &'a dyn ApiClient,
    sink: &'a dyn RecordSink,
    state: &'a dyn StateStore,
    config: &'a TapConfig,
    catalog: &'a Catalog,
    today: NaiveDate,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        client: &'a dyn ApiClient,
        sink: &'a dyn RecordSink,
        state: &'a dyn StateStore,
        config: &'a TapConfig,
        catalog: &'a Catalog,
    ) -> Self {
        Self { client, sink, state, config, catalog, today: Utc::now().date_naive() }
    }

    /// Pin the analytics window clock, for deterministic tests.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Run the sync: every selected top-level stream in registry order,
    /// resuming past streams already completed by an interrupted run.
    ///
    /// # Errors
    ///
    /// Any client, sink, or state failure aborts the run; bookmarks
    /// committed so far stay persisted.
    pub fn run(&self) -> Result<SyncSummary> {
        self.config.validate()?;
        let selected = self.catalog.selected_streams();
        let mut summary = SyncSummary::default();
        if selected.is_empty() {
            tracing::warn!("No streams selected, nothing to sync");
            return Ok(summary);
        }
        let account_ids = self.config.account_ids()?;
        let mut pending_resume = self.state.currently_syncing().map_err(state_err)?;
        if let Some(stream) = &pending_resume {
            tracing::info!(stream, "Resuming interrupted sync");
        }

        for def in top_level() {
            if let Some(last) = &pending_resume {
                if last != def.name {
                    continue;
                }
                pending_resume = None;
            }
            if !is_active(def, &selected) {
                continue;
            }

            tracing::info!(stream = def.name, "START Syncing");
            self.set_currently_syncing(Some(def.name))?;
            if selected.contains(def.name) {
                self.write_schema_for(def)?;
            }

            let filter_params = render_account_filter(def.account_filter, &account_ids);
            let (records, max_bookmark) =
                self.sync_endpoint(def, &selected, &filter_params, None, &mut summary)?;
            summary.add(def.name, records);

            if selected.contains(def.name)
                && def.bookmark_style == BookmarkStyle::Datetime
                && def.replication_key.is_some()
            {
                self.write_bookmark(def.name, BookmarkValue::Timestamp(max_bookmark))?;
            }
            self.set_currently_syncing(None)?;
            tracing::info!(
                stream = def.name,
                records = summary.totals.get(def.name).copied().unwrap_or(0),
                "FINISHED Syncing"
            );
        }

        Ok(summary)
    }

    /// Page one endpoint and dispatch its active children per record.
    ///
    /// Returns the records emitted for this stream itself (children are
    /// tallied into `summary` directly) and the max replication-key
    /// value observed.
    fn sync_endpoint(
        &self,
        def: &'static StreamDefinition,
        selected: &BTreeSet<String>,
        extra_params: &[(String, String)],
        parent_id: Option<&Value>,
        summary: &mut SyncSummary,
    ) -> Result<(u64, String)> {
        let entry = self.entry_for(def);
        let emit = selected.contains(def.name);
        let last_datetime = self.last_datetime(def.name)?;
        let mut max_bookmark = last_datetime.clone();
        let mut seen = self.load_seen_set(def)?;
        let mut total = 0u64;

        let active_children: Vec<&'static StreamDefinition> = def
            .children
            .iter()
            .filter_map(|name| by_name(name))
            .filter(|child| is_active(child, selected))
            .collect();
        // Seed child accumulators up front so a childless page run still
        // re-commits existing child bookmarks unchanged.
        let mut child_max_bookmarks: BTreeMap<&'static str, String> = BTreeMap::new();
        for child in &active_children {
            if selected.contains(child.name) {
                self.write_schema_for(child)?;
            }
            if child.replication_key.is_some() {
                child_max_bookmarks.insert(child.name, self.last_datetime(child.name)?);
            }
        }

        let mut params: Vec<(String, String)> = vec![
            ("start".into(), "0".into()),
            (
                "count".into(),
                def.page_size_override.unwrap_or(self.config.page_size).to_string(),
            ),
        ];
        params.extend(def.params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        params.extend(extra_params.iter().cloned());
        let url = build_url(def.path, &params);
        let headers: Vec<(String, String)> =
            def.headers.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();

        for page in PageWalker::new(self.client, def.name, def.data_key, headers, url) {
            let page = page?;
            let Some(raw) = page.get(def.data_key).and_then(Value::as_array) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let time_extracted = Utc::now();
            let transformed = transform_records(raw, &entry.schema);

            if emit {
                let batch = RecordBatch { def, time_extracted, parent_id };
                let outcome = process_records(
                    &batch,
                    transformed.clone(),
                    &last_datetime,
                    &max_bookmark,
                    &mut seen,
                    self.sink,
                )?;
                total += outcome.records_written;
                max_bookmark = outcome.max_bookmark;
                // Page-boundary flush keeps at most one page at risk.
                match def.bookmark_style {
                    BookmarkStyle::Datetime if def.is_top_level() && def.replication_key.is_some() => {
                        self.write_bookmark(def.name, BookmarkValue::Timestamp(max_bookmark.clone()))?;
                    }
                    BookmarkStyle::SeenSet => {
                        self.write_bookmark(
                            def.name,
                            BookmarkValue::SeenSet(seen.iter().cloned().collect()),
                        )?;
                    }
                    BookmarkStyle::Datetime => {}
                }
            }

            for child in &active_children {
                for parent_record in &transformed {
                    let child_max = self.sync_child(def, child, parent_record, selected, summary)?;
                    if let (Some(new_max), Some(slot)) =
                        (child_max, child_max_bookmarks.get_mut(child.name))
                    {
                        if later_instant(&new_max, slot)? {
                            *slot = new_max;
                        }
                    }
                }
            }
        }

        // Child bookmarks commit only after the parent walk completes.
        for (child, value) in child_max_bookmarks {
            self.write_bookmark(child, BookmarkValue::Timestamp(value))?;
        }

        Ok((total, max_bookmark))
    }

    /// Sync one child stream for one parent record. Returns the child's
    /// max bookmark, or `None` when the dispatch was skipped.
    fn sync_child(
        &self,
        parent: &'static StreamDefinition,
        child: &'static StreamDefinition,
        parent_record: &Value,
        selected: &BTreeSet<String>,
        summary: &mut SyncSummary,
    ) -> Result<Option<String>> {
        let Some(foreign_key) = child.foreign_key else {
            return Ok(None);
        };
        let Some(parent_value) = parent_record.get(foreign_key) else {
            tracing::warn!(
                stream = child.name,
                parent = parent.name,
                foreign_key,
                "Skipping child call, parent record has no foreign key value"
            );
            return Ok(None);
        };
        let parent_scalar = scalar_string(parent_value);

        let mut child_params: Vec<(String, String)> = Vec::new();
        match (parent.name, child.name) {
            ("accounts", "video_ads") => {
                let Some(owner) = parent_record
                    .get("reference_organization_id")
                    .filter(|v| !v.is_null())
                else {
                    tracing::warn!(
                        account = %parent_scalar,
                        "Skipping video_ads call for account, reference_organization_id not found"
                    );
                    return Ok(None);
                };
                child_params.push((
                    "account".into(),
                    format!("urn:li:sponsoredAccount:{parent_scalar}"),
                ));
                child_params.push((
                    "owner".into(),
                    format!("urn:li:organization:{}", scalar_string(owner)),
                ));
            }
            ("campaigns", "creatives") => {
                // The creatives finder requires a Rest.li encoded list.
                child_params.push((
                    "campaigns".into(),
                    format!("List(urn%3Ali%3AsponsoredCampaign%3A{parent_scalar})"),
                ));
            }
            ("campaigns", _) if child.is_analytics() => {
                child_params.push((
                    "campaigns[0]".into(),
                    format!("urn:li:sponsoredCampaign:{parent_scalar}"),
                ));
            }
            _ => {}
        }

        let (records, max_bookmark) = if child.is_analytics() {
            if !selected.contains(child.name) {
                return Ok(None);
            }
            let entry = self.entry_for(child);
            let mut base_params = child_params;
            base_params.extend(child.params.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
            if let Some(pivot) = child.pivot {
                base_params.push(("pivot".into(), pivot.to_string()));
            }
            let fields = entry.field_names();
            let job = AnalyticsJob {
                def: child,
                schema: &entry.schema,
                selected_fields: &fields,
                base_params,
                last_datetime: self.last_datetime(child.name)?,
                date_window_size: self.config.date_window_size,
                today: self.today,
                parent_id: Some(parent_value.clone()),
            };
            sync_window_stream(self.client, self.sink, &job)?
        } else {
            self.sync_endpoint(child, selected, &child_params, Some(parent_value), summary)?
        };

        summary.add(child.name, records);
        Ok(Some(max_bookmark))
    }

    fn entry_for(&self, def: &StreamDefinition) -> CatalogEntry {
        self.catalog.entry(def.name).cloned().unwrap_or_else(|| CatalogEntry {
            stream: def.name.to_string(),
            ..CatalogEntry::default()
        })
    }

    fn write_schema_for(&self, def: &StreamDefinition) -> Result<()> {
        let entry = self.entry_for(def);
        let keys: Vec<String> = def.primary_keys.iter().map(|k| (*k).to_string()).collect();
        self.sink.write_schema(def.name, &entry.schema, &keys)
    }

    /// Scalar bookmark for `stream`, falling back to the configured
    /// start date.
    fn last_datetime(&self, stream: &str) -> Result<String> {
        match self.state.get_bookmark(stream).map_err(state_err)? {
            Some(BookmarkValue::Timestamp(ts)) => Ok(ts),
            _ => Ok(self.config.start_date.clone()),
        }
    }

    fn load_seen_set(&self, def: &StreamDefinition) -> Result<BTreeSet<Vec<String>>> {
        if def.bookmark_style != BookmarkStyle::SeenSet {
            return Ok(BTreeSet::new());
        }
        match self.state.get_bookmark(def.name).map_err(state_err)? {
            Some(BookmarkValue::SeenSet(keys)) => Ok(keys.into_iter().collect()),
            _ => Ok(BTreeSet::new()),
        }
    }

    fn write_bookmark(&self, stream: &str, value: BookmarkValue) -> Result<()> {
        self.state.set_bookmark(stream, value).map_err(state_err)?;
        tracing::info!(stream, "Write state for stream");
        let snapshot = self.state.snapshot().map_err(state_err)?;
        self.sink.write_state(&snapshot)
    }

    fn set_currently_syncing(&self, stream: Option<&str>) -> Result<()> {
        self.state.set_currently_syncing(stream).map_err(state_err)?;
        let snapshot = self.state.snapshot().map_err(state_err)?;
        self.sink.write_state(&snapshot)
    }
}

/// Whether `def` itself or any descendant is selected.
fn is_active(def: &StreamDefinition, selected: &BTreeSet<String>) -> bool {
    selected.contains(def.name)
        || def
            .children
            .iter()
            .filter_map(|name| by_name(name))
            .any(|child| is_active(child, selected))
}

/// Render configured account IDs into the endpoint's filter style.
#[must_use]
pub fn render_account_filter(filter: AccountFilter, account_ids: &[u64]) -> Vec<(String, String)> {
    account_ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| match filter {
            AccountFilter::None => None,
            AccountFilter::SearchId => {
                Some((format!("search.id.values[{i}]"), id.to_string()))
            }
            AccountFilter::SearchAccount => Some((
                format!("search.account.values[{i}]"),
                format!("urn:li:sponsoredAccount:{id}"),
            )),
            AccountFilter::AccountsList => {
                Some((format!("accounts[{i}]"), format!("urn:li:sponsoredAccount:{id}")))
            }
        })
        .collect()
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether `candidate` parses to a strictly later instant than
/// `current`.
fn later_instant(candidate: &str, current: &str) -> Result<bool> {
    Ok(parse_instant(candidate)? > parse_instant(current)?)
}

fn state_err(err: linktap_state::StateError) -> TapError {
    TapError::State(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_filter_renders_all_three_styles() {
        let ids = vec![111, 222];
        assert_eq!(
            render_account_filter(AccountFilter::SearchId, &ids),
            vec![
                ("search.id.values[0]".to_string(), "111".to_string()),
                ("search.id.values[1]".to_string(), "222".to_string()),
            ]
        );
        assert_eq!(
            render_account_filter(AccountFilter::SearchAccount, &ids)[1],
            (
                "search.account.values[1]".to_string(),
                "urn:li:sponsoredAccount:222".to_string()
            )
        );
        assert_eq!(
            render_account_filter(AccountFilter::AccountsList, &ids)[0],
            ("accounts[0]".to_string(), "urn:li:sponsoredAccount:111".to_string())
        );
        assert!(render_account_filter(AccountFilter::None, &ids).is_empty());
    }

    #[test]
    fn activity_considers_descendants() {
        let selected: BTreeSet<String> = ["creatives".to_string()].into_iter().collect();
        let campaigns = by_name("campaigns").unwrap();
        let accounts = by_name("accounts").unwrap();
        assert!(is_active(campaigns, &selected));
        assert!(!is_active(accounts, &selected));
    }

    #[test]
    fn later_instant_compares_parsed_values() {
        assert!(later_instant(
            "2024-06-02T00:00:00.000000Z",
            "2024-06-01T00:00:00.000000Z"
        )
        .unwrap());
        assert!(!later_instant(
            "2024-06-01T00:00:00.000000Z",
            "2024-06-01T00:00:00+00:00"
        )
        .unwrap());
    }
}
