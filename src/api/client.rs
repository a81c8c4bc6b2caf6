//! HTTP client for the Cloud.dk control plane.

use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::debug;

use super::{ApiError, ApiFuture, ControlPlane, ServerBody, ServerCreateBody};

/// Default base URL of the Cloud.dk API.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.cloud.dk/v1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const API_KEY_HEADER: &str = "X-Api-Key";
const SERVERS_PATH: &str = "cloudservers";
const DEFAULT_RETRY_UNIT: Duration = Duration::from_secs(1);

/// Connection settings for [`CloudApi`].
#[derive(Clone, Eq, PartialEq)]
pub struct ApiSettings {
    /// Base URL of the API, for example [`DEFAULT_API_ENDPOINT`].
    pub endpoint: String,
    /// API key sent with every request.
    pub key: String,
    /// Interval multiplied by a [`RetryPolicy`]'s delay.
    pub retry_unit: Duration,
}

impl ApiSettings {
    /// Creates settings with the default one-second retry unit.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            retry_unit: DEFAULT_RETRY_UNIT,
        }
    }

    /// Overrides the retry unit.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = unit;
        self
    }
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("retry_unit", &self.retry_unit)
            .finish()
    }
}

/// Number of attempts and the delay between them for one call site.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay between attempts, in retry units.
    pub delay_units: u32,
}

impl RetryPolicy {
    /// One attempt; used where the caller handles failure itself.
    pub const SINGLE: Self = Self {
        attempts: 1,
        delay_units: 1,
    };

    /// Sixty attempts ten units apart; used for deletion, which must not be
    /// abandoned.
    pub const PERSISTENT: Self = Self {
        attempts: 60,
        delay_units: 10,
    };
}

struct Call<'a> {
    method: Method,
    segments: &'a [&'a str],
    query: &'a [(&'a str, &'a str)],
    body: Option<&'a ServerCreateBody>,
    accept: &'a [u16],
    policy: RetryPolicy,
}

/// Control-plane client backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct CloudApi {
    http: reqwest::Client,
    base: Url,
    settings: ApiSettings,
}

impl CloudApi {
    /// Builds a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Endpoint`] when the endpoint is not an absolute
    /// URL that can carry path segments.
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let base = Url::parse(&settings.endpoint).map_err(|err| ApiError::Endpoint {
            endpoint: settings.endpoint.clone(),
            message: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::Endpoint {
                endpoint: settings.endpoint,
                message: String::from("endpoint cannot carry path segments"),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            http,
            base,
            settings,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Endpoint {
                endpoint: self.settings.endpoint.clone(),
                message: String::from("endpoint cannot carry path segments"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, call: Call<'_>) -> Result<Vec<u8>, ApiError> {
        let url = self.url(call.segments)?;
        let mut attempt = 1;
        loop {
            match self.attempt(&call, &url).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < call.policy.attempts => {
                    debug!(
                        method = %call.method,
                        path = url.path(),
                        attempt,
                        error = %err,
                        "control-plane request failed; retrying"
                    );
                    attempt += 1;
                    sleep(self.settings.retry_unit * call.policy.delay_units).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, call: &Call<'_>, url: &Url) -> Result<Vec<u8>, ApiError> {
        let mut request = self
            .http
            .request(call.method.clone(), url.clone())
            .header(API_KEY_HEADER, &self.settings.key)
            .header(ACCEPT, "application/json");
        if !call.query.is_empty() {
            request = request.query(call.query);
        }
        if let Some(body) = call.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| ApiError::Request {
            method: call.method.to_string(),
            path: url.path().to_owned(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let body = response.bytes().await.map_err(|err| ApiError::Request {
            method: call.method.to_string(),
            path: url.path().to_owned(),
            message: err.to_string(),
        })?;

        if call.accept.contains(&status.as_u16()) {
            return Ok(body.to_vec());
        }

        Err(ApiError::Status {
            method: call.method.to_string(),
            path: url.path().to_owned(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::Decode {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

impl ControlPlane for CloudApi {
    fn create_server<'a>(&'a self, body: &'a ServerCreateBody) -> ApiFuture<'a, ServerBody> {
        Box::pin(async move {
            let response = self
                .execute(Call {
                    method: Method::POST,
                    segments: &[SERVERS_PATH],
                    query: &[],
                    body: Some(body),
                    accept: &[200],
                    policy: RetryPolicy::SINGLE,
                })
                .await?;
            decode(SERVERS_PATH, &response)
        })
    }

    fn list_servers<'a>(&'a self, hostname: &'a str) -> ApiFuture<'a, Vec<ServerBody>> {
        Box::pin(async move {
            let response = self
                .execute(Call {
                    method: Method::GET,
                    segments: &[SERVERS_PATH],
                    query: &[("hostname", hostname)],
                    body: None,
                    accept: &[200],
                    policy: RetryPolicy::SINGLE,
                })
                .await?;
            decode(SERVERS_PATH, &response)
        })
    }

    fn get_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ServerBody> {
        Box::pin(async move {
            let response = self
                .execute(Call {
                    method: Method::GET,
                    segments: &[SERVERS_PATH, id],
                    query: &[],
                    body: None,
                    accept: &[200],
                    policy: RetryPolicy::SINGLE,
                })
                .await?;
            decode(SERVERS_PATH, &response)
        })
    }

    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.execute(Call {
                method: Method::DELETE,
                segments: &[SERVERS_PATH, id],
                query: &[],
                body: None,
                accept: &[200, 404],
                policy: RetryPolicy::PERSISTENT,
            })
            .await
            .map(drop)
        })
    }
}
