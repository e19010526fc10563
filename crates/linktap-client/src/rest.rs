//! Production [`ApiClient`] implementation.

use std::sync::Mutex;
use std::time::Duration;

use linktap_types::config::TapConfig;
use linktap_types::error::{Result, TapError};
use serde_json::Value;

use crate::{ApiClient, LINKEDIN_VERSION, TOKEN_URL};

/// Maximum attempts for a single logical request.
const MAX_TRIES: u32 = 5;
/// Base delay for exponential backoff between attempts.
const BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Delay before attempt `attempt` (1-based); doubles each retry.
fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Blocking REST client with OAuth refresh and bounded retry.
pub struct RestClient {
    http: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
    refresh_token: Option<String>,
    access_token: Mutex<String>,
    user_agent: Option<String>,
}

impl RestClient {
    /// Build a client from tap configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TapError::Transport`] when the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: &TapConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| TapError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            access_token: Mutex::new(config.access_token.clone()),
            user_agent: config.user_agent.clone(),
        })
    }

    /// Exchange the refresh token for a fresh access token.
    ///
    /// A no-op without a refresh token: old connections supply a
    /// still-valid access token directly.
    ///
    /// # Errors
    ///
    /// Returns a typed error when the token endpoint rejects the exchange.
    pub fn refresh_access_token(&self) -> Result<()> {
        let Some(refresh_token) = self.refresh_token.as_deref() else {
            return Ok(());
        };

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        let mut request = self.http.post(TOKEN_URL).form(&params);
        if let Some(agent) = &self.user_agent {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }
        let response = request
            .send()
            .map_err(|err| TapError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .map_err(|err| TapError::Decode(err.to_string()))?;
        if status != 200 {
            return Err(TapError::from_status(status, Some(&body)));
        }

        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| TapError::Decode("token response missing access_token".into()))?;
        *self
            .access_token
            .lock()
            .map_err(|_| TapError::State("access token lock poisoned".into()))? = token.to_string();
        tracing::info!("Authorized, access token refreshed");
        Ok(())
    }

    fn get_once(&self, url: &str, headers: &[(String, String)]) -> Result<Value> {
        let token = self
            .access_token
            .lock()
            .map_err(|_| TapError::State("access token lock poisoned".into()))?
            .clone();

        let mut request = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header("LinkedIn-Version", LINKEDIN_VERSION);
        if let Some(agent) = &self.user_agent {
            request = request.header(reqwest::header::USER_AGENT, agent);
        }
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .map_err(|err| TapError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        if status == 200 {
            return response
                .json()
                .map_err(|err| TapError::Decode(err.to_string()));
        }

        let body: Option<Value> = response.json().ok();
        let err = TapError::from_status(status, body.as_ref());
        if status == 401 && err.to_string().contains("Expired access token") {
            tracing::error!(
                "Your access_token has expired as per LinkedIn's security policy. \
                 Please re-authenticate your connection to generate a new token \
                 and resume extraction."
            );
        }
        Err(err)
    }
}

impl ApiClient for RestClient {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Value> {
        let mut attempt = 1;
        loop {
            match self.get_once(url, headers) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < MAX_TRIES => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "Retryable request failure, backing off"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
