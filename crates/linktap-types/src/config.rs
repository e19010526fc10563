//! Tap configuration model and validation.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::TapError;

/// Seconds before giving up on a single API request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
/// Records requested per page for offset-paginated endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Days covered by one analytics date window.
pub const DEFAULT_DATE_WINDOW_SIZE: u32 = 30;

/// Tap configuration as loaded from the config JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapConfig {
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Long-lived refresh token; when absent the access token must be valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Current access token.
    pub access_token: String,
    /// Earliest replication instant (RFC 3339) for first-time syncs.
    pub start_date: String,
    /// Comma-separated numeric ad-account IDs to filter on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<String>,
    /// Sent as `User-Agent` on every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_date_window_size")]
    pub date_window_size: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_date_window_size() -> u32 {
    DEFAULT_DATE_WINDOW_SIZE
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl TapConfig {
    /// Parse the configured account list into numeric IDs.
    ///
    /// Whitespace is tolerated around entries. An empty or absent
    /// `accounts` value yields an empty list (no account filtering).
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Config`] when an entry is non-numeric.
    pub fn account_ids(&self) -> Result<Vec<u64>, TapError> {
        let Some(raw) = self.accounts.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| {
                entry.parse::<u64>().map_err(|_| {
                    TapError::Config(format!(
                        "The account '{entry}' provided in the configuration is having non-numeric value."
                    ))
                })
            })
            .collect()
    }

    /// Validate field-level constraints before any request is issued.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Config`] for a malformed `start_date`,
    /// non-numeric `accounts`, or zero-valued sizes.
    pub fn validate(&self) -> Result<(), TapError> {
        DateTime::parse_from_rfc3339(&self.start_date).map_err(|err| {
            TapError::Config(format!(
                "start_date '{}' is not a valid RFC 3339 timestamp: {err}",
                self.start_date
            ))
        })?;
        self.account_ids()?;
        if self.page_size == 0 {
            return Err(TapError::Config("page_size must be positive".into()));
        }
        if self.date_window_size == 0 {
            return Err(TapError::Config("date_window_size must be positive".into()));
        }
        Ok(())
    }
}
