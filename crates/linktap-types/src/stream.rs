//! Declarative stream registry.
//!
//! Each LinkedIn Ads endpoint the tap can replicate is described by one
//! static [`StreamDefinition`]: endpoint path, primary keys, replication
//! key, account-filter style, parent/child wiring, and endpoint-specific
//! query parameters. The registry is data consumed by one generic sync
//! engine; streams carry no behavior of their own.

use serde::{Deserialize, Serialize};

/// How account IDs from the tap config are rendered into query parameters.
///
/// The three styles are mutually exclusive and endpoint-specific:
///
/// - `SearchId`: `search.id.values[i]=<numeric account id>`
/// - `SearchAccount`: `search.account.values[i]=urn:li:sponsoredAccount:<id>`
/// - `AccountsList`: `accounts[i]=urn:li:sponsoredAccount:<id>`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountFilter {
    /// Endpoint takes no account filter (child streams filter by parent).
    #[default]
    None,
    /// Indexed `search.id.values[i]` with bare numeric IDs.
    SearchId,
    /// Indexed `search.account.values[i]` with sponsored-account URNs.
    SearchAccount,
    /// Indexed `accounts[i]` with sponsored-account URNs.
    AccountsList,
}

/// Bookmark representation used by a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkStyle {
    /// Scalar RFC 3339 high-watermark on the replication key.
    #[default]
    Datetime,
    /// Set of already-emitted composite keys, for membership-style
    /// streams without a monotonic replication key.
    SeenSet,
}

/// Static, immutable description of one replicable endpoint.
///
/// Loaded once at startup via [`definitions`]; read-only for the process
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDefinition {
    /// Stream name as it appears in the catalog and persisted state.
    pub name: &'static str,
    /// Endpoint path relative to the REST base URL.
    pub path: &'static str,
    /// Ordered primary-key field names (post-transform, snake_case).
    pub primary_keys: &'static [&'static str],
    /// Replication key field; `None` means full-table semantics.
    pub replication_key: Option<&'static str>,
    /// How configured account IDs are rendered into the request.
    pub account_filter: AccountFilter,
    /// Parent stream name, for child streams.
    pub parent: Option<&'static str>,
    /// Child stream names, dispatched per parent record, in order.
    pub children: &'static [&'static str],
    /// Parent-record field (post-transform) seeding this child's filter.
    pub foreign_key: Option<&'static str>,
    /// Endpoint-specific static query parameters (finder, sort, pivot).
    pub params: &'static [(&'static str, &'static str)],
    /// Extra request headers required by the endpoint.
    pub headers: &'static [(&'static str, &'static str)],
    /// Response field holding the record array.
    pub data_key: &'static str,
    /// Overrides the configured page size for this endpoint.
    pub page_size_override: Option<u32>,
    /// Analytics pivot dimension; `Some` marks the window-sync path.
    pub pivot: Option<&'static str>,
    /// Camel-case fields the analytics finder rejects as request fields
    /// (foreign keys and date-range components already implied by the
    /// query). Excluded when building field chunks.
    pub chunk_excluded_fields: &'static [&'static str],
    /// Bookmark representation for this stream.
    pub bookmark_style: BookmarkStyle,
}

impl StreamDefinition {
    /// Whether this stream uses the analytics window-sync path instead of
    /// offset pagination.
    #[must_use]
    pub fn is_analytics(&self) -> bool {
        self.pivot.is_some()
    }

    /// Whether this stream is a top-level (parentless) endpoint.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Fields the ad-analytics finder cannot accept in its `fields` parameter.
const AD_ANALYTICS_EXCLUDED: &[&str] = &[
    "campaign",
    "campaignId",
    "startAt",
    "endAt",
    "creative",
    "creativeId",
];

/// Rest.li headers required by the creatives search finder.
const CREATIVES_HEADERS: &[(&str, &str)] = &[
    ("X-Restli-Protocol-Version", "2.0.0"),
    ("X-RestLi-Method", "FINDER"),
];

const SEARCH_SORTED: &[(&str, &str)] = &[
    ("q", "search"),
    ("sort.field", "ID"),
    ("sort.order", "ASCENDING"),
];

static DEFINITIONS: &[StreamDefinition] = &[
    StreamDefinition {
        name: "accounts",
        path: "adAccounts",
        primary_keys: &["id"],
        replication_key: Some("last_modified_time"),
        account_filter: AccountFilter::SearchId,
        parent: None,
        children: &["video_ads"],
        foreign_key: None,
        params: SEARCH_SORTED,
        headers: &[],
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "video_ads",
        path: "adDirectSponsoredContents",
        primary_keys: &["content_reference"],
        replication_key: Some("last_modified_time"),
        account_filter: AccountFilter::None,
        parent: Some("accounts"),
        children: &[],
        foreign_key: Some("id"),
        params: &[("q", "account")],
        headers: &[],
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "account_users",
        path: "adAccountUsers",
        primary_keys: &["account_id", "user_person_id"],
        replication_key: None,
        account_filter: AccountFilter::AccountsList,
        parent: None,
        children: &[],
        foreign_key: None,
        params: &[("q", "accounts")],
        headers: &[],
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::SeenSet,
    },
    StreamDefinition {
        name: "campaign_groups",
        path: "adCampaignGroups",
        primary_keys: &["id"],
        replication_key: Some("last_modified_time"),
        account_filter: AccountFilter::SearchAccount,
        parent: None,
        children: &[],
        foreign_key: None,
        params: SEARCH_SORTED,
        headers: &[],
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "campaigns",
        path: "adCampaigns",
        primary_keys: &["id"],
        replication_key: Some("last_modified_time"),
        account_filter: AccountFilter::SearchAccount,
        parent: None,
        children: &["ad_analytics_by_campaign", "creatives", "ad_analytics_by_creative"],
        foreign_key: None,
        params: SEARCH_SORTED,
        headers: &[],
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "creatives",
        path: "creatives",
        primary_keys: &["id"],
        replication_key: Some("last_modified_at"),
        account_filter: AccountFilter::None,
        parent: Some("campaigns"),
        children: &[],
        foreign_key: Some("id"),
        params: &[("q", "criteria"), ("sortOrder", "ASCENDING")],
        headers: CREATIVES_HEADERS,
        data_key: "elements",
        page_size_override: None,
        pivot: None,
        chunk_excluded_fields: &[],
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "ad_analytics_by_campaign",
        path: "adAnalytics",
        primary_keys: &["campaign_id", "start_at"],
        replication_key: Some("end_at"),
        account_filter: AccountFilter::AccountsList,
        parent: Some("campaigns"),
        children: &[],
        foreign_key: Some("id"),
        params: &[("q", "analytics"), ("timeGranularity", "DAILY")],
        headers: &[],
        data_key: "elements",
        page_size_override: Some(10_000),
        pivot: Some("CAMPAIGN"),
        chunk_excluded_fields: AD_ANALYTICS_EXCLUDED,
        bookmark_style: BookmarkStyle::Datetime,
    },
    StreamDefinition {
        name: "ad_analytics_by_creative",
        path: "adAnalytics",
        primary_keys: &["creative_id", "start_at"],
        replication_key: Some("end_at"),
        account_filter: AccountFilter::AccountsList,
        parent: Some("campaigns"),
        children: &[],
        foreign_key: Some("id"),
        params: &[("q", "analytics"), ("timeGranularity", "DAILY")],
        headers: &[],
        data_key: "elements",
        page_size_override: Some(10_000),
        pivot: Some("CREATIVE"),
        chunk_excluded_fields: AD_ANALYTICS_EXCLUDED,
        bookmark_style: BookmarkStyle::Datetime,
    },
];

/// All stream definitions, top-level streams in catalog order.
#[must_use]
pub fn definitions() -> &'static [StreamDefinition] {
    DEFINITIONS
}

/// Look up a stream definition by name.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static StreamDefinition> {
    DEFINITIONS.iter().find(|def| def.name == name)
}

/// Top-level streams in registry order.
pub fn top_level() -> impl Iterator<Item = &'static StreamDefinition> {
    DEFINITIONS.iter().filter(|def| def.is_top_level())
}
