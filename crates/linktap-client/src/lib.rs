//! HTTP collaborator for the linktap sync engine.
//!
//! The engine talks to the upstream API only through the object-safe
//! [`ApiClient`] trait; [`RestClient`] is the production implementation
//! (blocking reqwest, OAuth refresh flow, bounded retry with backoff).
//! All retry logic lives here; the engine never retries.

#![warn(clippy::pedantic)]

pub mod rest;

pub use rest::RestClient;

use linktap_types::error::Result;
use serde_json::Value;

/// REST base for all data endpoints.
pub const BASE_URL: &str = "https://api.linkedin.com/rest";

/// OAuth token exchange endpoint.
pub const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";

/// Versioned-API header value every request must carry.
pub const LINKEDIN_VERSION: &str = "202207";

/// Blocking HTTP GET contract consumed by the sync engine.
///
/// Implementations own authentication, retries, and status-to-error
/// mapping; the engine only sees a JSON body or a typed
/// [`TapError`](linktap_types::error::TapError).
pub trait ApiClient: Send + Sync {
    /// Issue a GET for a fully-formed URL with endpoint-specific extra
    /// headers, returning the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`TapError`](linktap_types::error::TapError) for non-2xx
    /// responses (after retries for retryable statuses), transport
    /// failures, and non-JSON bodies.
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Value>;
}
