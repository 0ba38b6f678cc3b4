//! Pure Supabase REST client.
//!
//! A minimal client for a Supabase project. Supports calling PostgREST
//! remote procedures, invoking edge functions, and a cheap connection check.
//! Every call is raced against a timeout and retried with exponential backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use supabase_client::SupabaseClient;
//!
//! let client = SupabaseClient::from_env()?;
//!
//! let rows: Vec<serde_json::Value> = client
//!     .rpc("get_requests_in_radius", &serde_json::json!({
//!         "center_lat": 34.05,
//!         "center_lng": -118.24,
//!         "radius_meters": 5000,
//!     }))
//!     .await?;
//! ```

pub mod error;
pub mod retry;

pub use error::{ErrorCode, PostgrestErrorBody, Result, SupabaseError};
pub use retry::{with_timeout, RetryPolicy, DEFAULT_TIMEOUT};

use std::time::Duration;

use secrecy::{ExposeSecret, SecretBox};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

const CLIENT_INFO: &str = "kindr-spatial";

/// Table probed by [`SupabaseClient::check_connection`].
const HEALTH_CHECK_TABLE: &str = "users";

const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Supabase REST client.
pub struct SupabaseClient {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: SecretBox<str>,
    access_token: Option<SecretBox<str>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Clone for SupabaseClient {
    fn clone(&self) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            anon_key: secret(self.anon_key.expose_secret()),
            access_token: self
                .access_token
                .as_ref()
                .map(|t| secret(t.expose_secret())),
            timeout: self.timeout,
            retry: self.retry,
        }
    }
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

fn secret(value: &str) -> SecretBox<str> {
    SecretBox::new(Box::from(value))
}

impl SupabaseClient {
    /// Create a client for the project at `url` using its anon key.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            http_client: reqwest::Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            anon_key: secret(&anon_key.into()),
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Create from environment variables `SUPABASE_URL` and `SUPABASE_ANON_KEY`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| SupabaseError::Config("SUPABASE_URL not set".into()))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| SupabaseError::Config("SUPABASE_ANON_KEY not set".into()))?;
        Ok(Self::new(url, anon_key))
    }

    /// Per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Act on behalf of a signed-in user instead of the anon role.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(secret(&token.into()));
        self
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// URL of a PostgREST remote procedure.
    pub fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    /// URL of an edge function.
    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name)
    }

    fn bearer(&self) -> &str {
        self.access_token
            .as_ref()
            .map(|t| t.expose_secret())
            .unwrap_or_else(|| self.anon_key.expose_secret())
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(url)
            .header("apikey", self.anon_key.expose_secret())
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(self.bearer())
    }

    /// Call a PostgREST remote procedure with JSON parameters.
    pub async fn rpc<P, T>(&self, function: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.rpc_url(function);
        debug!(function, "Calling remote procedure");

        self.retry
            .run(function, || {
                with_timeout(function, self.timeout, async {
                    let resp = self.post(&url).json(params).send().await?;
                    decode(resp).await
                })
            })
            .await
    }

    /// Invoke an edge function. `body` is sent as JSON when present.
    pub async fn invoke_function<B, T>(&self, name: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.function_url(name);
        debug!(function = name, "Invoking edge function");

        self.retry
            .run(name, || {
                with_timeout(name, self.timeout, async {
                    let mut req = self.post(&url);
                    if let Some(body) = body {
                        req = req.json(body);
                    }
                    let resp = req.send().await?;
                    decode(resp).await
                })
            })
            .await
    }

    /// Probe the REST endpoint. Never retried; failures are logged and reported as `false`.
    pub async fn check_connection(&self) -> bool {
        let url = format!(
            "{}/rest/v1/{}?select=id&limit=1",
            self.base_url, HEALTH_CHECK_TABLE
        );

        let probe = with_timeout("connection_check", CONNECTION_CHECK_TIMEOUT, async {
            let resp = self
                .http_client
                .get(&url)
                .header("apikey", self.anon_key.expose_secret())
                .bearer_auth(self.bearer())
                .send()
                .await?;
            decode::<serde_json::Value>(resp).await
        })
        .await;

        match probe {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Connection check failed");
                false
            }
        }
    }
}

/// Turn a response into `T`, mapping non-2xx statuses onto [`SupabaseError::Api`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        let err = error::api_error(status.as_u16(), &text);
        warn!(status = status.as_u16(), code = %err.code(), error = %err, "Supabase request failed");
        return Err(err);
    }

    parse_body(&text)
}

/// Parse a success body. Void procedures return an empty body, which decodes as `null`.
pub fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text)
        .map_err(|e| SupabaseError::Parse(format!("Failed to deserialize response: {}", e)))
}
