//! Link-based pagination walker.
//!
//! Each response carries a `paging.links` array of relation-typed links;
//! the walker follows the `rel == "next"` href until none is returned or
//! a page carries no records. The href is percent-decoded before reuse,
//! except for the creative search endpoint whose filter values are
//! themselves colon-delimited URNs and must be re-issued exactly as
//! received.

use linktap_client::ApiClient;
use linktap_types::error::Result;
use serde_json::Value;

/// Host prepended to relative paging hrefs.
const API_HOST: &str = "https://api.linkedin.com";

/// Build a full request URL from an endpoint path and query parameters.
///
/// Parameters are joined verbatim; values that need to stay encoded
/// (the creatives campaign filter) are stored pre-encoded.
#[must_use]
pub fn build_url(path: &str, params: &[(String, String)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}/{path}?{query}", linktap_client::BASE_URL)
}

/// Extract the next-page URL from a response payload, if any.
///
/// Hrefs under `rest/creatives` are kept percent-encoded; all others are
/// decoded before reuse.
#[must_use]
pub fn next_page_url(page: &Value) -> Option<String> {
    let links = page.get("paging")?.get("links")?.as_array()?;
    let mut next_url = None;
    for link in links {
        if link.get("rel").and_then(Value::as_str) != Some("next") {
            continue;
        }
        let Some(href) = link.get("href").and_then(Value::as_str) else {
            continue;
        };
        if href.contains("rest/creatives") {
            return Some(format!("{API_HOST}{href}"));
        }
        let decoded = urlencoding::decode(href).map_or_else(|_| href.to_string(), |d| d.into_owned());
        next_url = Some(format!("{API_HOST}{decoded}"));
    }
    next_url
}

/// Lazy, finite, non-restartable sequence of raw page payloads.
///
/// Stops after a page with no next link, after a page whose data
/// envelope holds no records, or after the first error (no partial
/// continuation).
pub struct PageWalker<'a> {
    client: &'a dyn ApiClient,
    stream: &'a str,
    data_key: &'a str,
    headers: Vec<(String, String)>,
    next_url: Option<String>,
    page: u32,
}

impl<'a> PageWalker<'a> {
    /// Start a walk at `url`.
    #[must_use]
    pub fn new(
        client: &'a dyn ApiClient,
        stream: &'a str,
        data_key: &'a str,
        headers: Vec<(String, String)>,
        url: String,
    ) -> Self {
        Self { client, stream, data_key, headers, next_url: Some(url), page: 0 }
    }

    fn page_is_empty(&self, payload: &Value) -> bool {
        payload
            .get(self.data_key)
            .and_then(Value::as_array)
            .is_none_or(Vec::is_empty)
    }
}

impl Iterator for PageWalker<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let url = self.next_url.take()?;
        self.page += 1;
        tracing::info!(stream = self.stream, url, "URL for stream");

        match self.client.get(&url, &self.headers) {
            Ok(payload) => {
                // An empty envelope ends the walk even when a next link
                // is present.
                if !self.page_is_empty(&payload) {
                    self.next_url = next_page_url(&payload);
                }
                tracing::info!(stream = self.stream, page = self.page, "Synced page");
                Some(Ok(payload))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<Vec<Value>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Value>) -> Self {
            Self { responses: Mutex::new(responses) }
        }
    }

    impl ApiClient for ScriptedClient {
        fn get(&self, _url: &str, _headers: &[(String, String)]) -> Result<Value> {
            Ok(self.responses.lock().unwrap().remove(0))
        }
    }

    fn page_with_next(records: Value, href: &str) -> Value {
        json!({
            "elements": records,
            "paging": {"links": [{"rel": "next", "href": href}]}
        })
    }

    #[test]
    fn follows_next_links_until_absent() {
        let client = ScriptedClient::new(vec![
            page_with_next(json!([{"id": 1}]), "/rest/adAccounts?start=1"),
            json!({"elements": [{"id": 2}], "paging": {"links": []}}),
        ]);
        let walker = PageWalker::new(&client, "accounts", "elements", Vec::new(), "u".into());
        let pages: Vec<_> = walker.map(Result::unwrap).collect();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn empty_page_stops_despite_next_link() {
        let client = ScriptedClient::new(vec![page_with_next(
            json!([]),
            "/rest/adAccounts?start=1",
        )]);
        let mut walker = PageWalker::new(&client, "accounts", "elements", Vec::new(), "u".into());
        assert!(walker.next().is_some());
        assert!(walker.next().is_none());
    }

    #[test]
    fn missing_envelope_stops_the_walk() {
        let client = ScriptedClient::new(vec![page_with_next(
            json!(null),
            "/rest/adAccounts?start=1",
        )]);
        let mut walker = PageWalker::new(&client, "accounts", "elements", Vec::new(), "u".into());
        assert!(walker.next().is_some());
        assert!(walker.next().is_none());
    }

    #[test]
    fn next_href_is_percent_decoded() {
        let page = json!({
            "paging": {"links": [{
                "rel": "next",
                "href": "/rest/adCampaigns?q=search&search.account.values%5B0%5D=urn%3Ali%3AsponsoredAccount%3A111"
            }]}
        });
        assert_eq!(
            next_page_url(&page).unwrap(),
            "https://api.linkedin.com/rest/adCampaigns?q=search&search.account.values[0]=urn:li:sponsoredAccount:111"
        );
    }

    #[test]
    fn creatives_href_stays_encoded() {
        let page = json!({
            "paging": {"links": [{
                "rel": "next",
                "href": "/rest/creatives?campaigns=List(urn%3Ali%3AsponsoredCampaign%3A123)&q=criteria"
            }]}
        });
        assert_eq!(
            next_page_url(&page).unwrap(),
            "https://api.linkedin.com/rest/creatives?campaigns=List(urn%3Ali%3AsponsoredCampaign%3A123)&q=criteria"
        );
    }

    #[test]
    fn non_next_links_are_ignored() {
        let page = json!({
            "paging": {"links": [{"rel": "prev", "href": "/rest/adAccounts?start=0"}]}
        });
        assert!(next_page_url(&page).is_none());
    }

    #[test]
    fn build_url_joins_params_verbatim() {
        let params = vec![
            ("start".to_string(), "0".to_string()),
            ("count".to_string(), "100".to_string()),
            ("q".to_string(), "search".to_string()),
        ];
        assert_eq!(
            build_url("adAccounts", &params),
            "https://api.linkedin.com/rest/adAccounts?start=0&count=100&q=search"
        );
    }
}
