//! The LaunchDarkly client handle.
//!
//! One [`LdClient`] owns the concurrency gate, the retry policies and the
//! cancellation token for a provider instance. Clones and [`LdClient::beta`]
//! handles share all three.

use crate::config::{ProviderConfig, BETA_API_VERSION};
use crate::error::{ProviderError, Result};
use ld_provider_retries::{
    Attempt, CancellationToken, ConcurrencyGate, ExecError, Page, Paginator, PolicySet,
    ResponseMeta, RetryExecutor, RetryPolicy,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Header carrying the API version.
pub const API_VERSION_HEADER: &str = "LD-API-Version";

/// Product token of the `User-Agent` header.
pub const USER_AGENT_PRODUCT: &str = "launchdarkly-terraform-provider";

/// Empty query string for [`LdClient::send`].
pub const NO_QUERY: &[(&str, String)] = &[];

struct Shared {
    http: reqwest::Client,
    base: Url,
    executor: RetryExecutor,
    policies: PolicySet,
    paginator: Paginator,
    shutdown: CancellationToken,
}

/// Client for the LaunchDarkly REST API.
#[derive(Clone)]
pub struct LdClient {
    shared: Arc<Shared>,
    api_version: HeaderValue,
    cancel: CancellationToken,
}

impl fmt::Debug for LdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdClient")
            .field("base", &self.shared.base.as_str())
            .field("api_version", &self.api_version)
            .field("gate", self.shared.executor.gate())
            .finish_non_exhaustive()
    }
}

/// Builder for [`LdClient`].
#[derive(Debug)]
pub struct LdClientBuilder {
    config: ProviderConfig,
    policies: PolicySet,
}

impl LdClientBuilder {
    /// Replace the default retry policies.
    #[must_use]
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<LdClient> {
        let config = self.config;
        config.validate()?;

        let mut auth = HeaderValue::from_str(&config.credential()?.header_value())
            .map_err(|_| ProviderError::Configuration("token is not a valid header value".into()))?;
        auth.set_sensitive(true);
        let api_version = HeaderValue::from_str(config.api_version()).map_err(|_| {
            ProviderError::Configuration("\"api_version\" is not a valid header value".into())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(format!("{USER_AGENT_PRODUCT}/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.http_timeout())
            .build()?;

        let shutdown = CancellationToken::new();
        let shared = Shared {
            http,
            base: config.base_url()?,
            executor: RetryExecutor::new(ConcurrencyGate::new(config.max_concurrency())),
            policies: self.policies,
            paginator: Paginator::new(config.page_size()),
            shutdown: shutdown.clone(),
        };

        Ok(LdClient {
            shared: Arc::new(shared),
            api_version,
            cancel: shutdown,
        })
    }
}

impl LdClient {
    /// Start building a client.
    pub fn builder(config: ProviderConfig) -> LdClientBuilder {
        LdClientBuilder {
            config,
            policies: PolicySet::default(),
        }
    }

    /// Build a client with the default policies.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// A handle that talks to beta endpoints.
    pub fn beta(&self) -> Self {
        Self {
            api_version: HeaderValue::from_static(BETA_API_VERSION),
            ..self.clone()
        }
    }

    /// A handle with its own cancellation token.
    ///
    /// Cancelling [`LdClient::cancellation`] on the returned handle stops its
    /// calls at their next slot wait or backoff. Shutting down the client
    /// cancels every scoped handle too.
    pub fn scoped(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Token observed by this handle's waits.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The gate shared by every handle of this client.
    pub fn gate(&self) -> &ConcurrencyGate {
        self.shared.executor.gate()
    }

    /// The active retry policies.
    pub fn policies(&self) -> &PolicySet {
        &self.shared.policies
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.shared.base
    }

    /// Cancel all pending waits and refuse new calls.
    pub fn shutdown(&self) {
        debug!(in_flight = self.gate().in_flight(), "Shutting down client");
        self.shared.shutdown.cancel();
        self.gate().close();
    }

    async fn execute<T, E, F, Fut>(&self, policy: &RetryPolicy, operation: F) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.shared
            .executor
            .execute(policy, &self.cancel, operation)
            .await
    }

    /// Run an operation, retrying `429` responses.
    pub async fn with_rate_limit<T, E, F, Fut>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.execute(&self.shared.policies.rate_limit, operation).await
    }

    /// Run an operation, retrying `409` responses.
    pub async fn with_conflict_retry<T, E, F, Fut>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.execute(&self.shared.policies.conflict, operation).await
    }

    /// Run an operation, retrying `404` responses. The final 404 is returned as-is.
    pub async fn with_not_found_retry<T, E, F, Fut>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.execute(&self.shared.policies.not_found, operation).await
    }

    /// Run an operation, retrying 5xx responses with exponential backoff.
    pub async fn with_server_retry<T, E, F, Fut>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.execute(&self.shared.policies.server_errors, operation).await
    }

    /// Run a closure while holding a concurrency slot.
    pub async fn with_concurrency<T, E, F, Fut>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<ExecError>,
    {
        self.gate().with_slot(&self.cancel, f).await
    }

    /// Drain a list endpoint with the configured page size.
    pub async fn drain_all<T, E, F, Fut>(&self, fetch_page: F) -> std::result::Result<Vec<T>, E>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, E>>,
        E: From<ExecError>,
    {
        self.shared.paginator.drain_all(fetch_page).await
    }

    /// Send one request and decode the response body.
    ///
    /// Non-2xx responses become [`ProviderError::Api`] carrying the body. An
    /// empty body decodes as JSON `null`.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Attempt<T, ProviderError> {
        let url = match self.shared.base.join(path) {
            Ok(url) => url,
            Err(err) => return Attempt::err(err.into(), None),
        };

        let mut request = self
            .shared
            .http
            .request(method.clone(), url)
            .header(API_VERSION_HEADER, self.api_version.clone());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Attempt::err(err.into(), None),
        };
        let meta = ResponseMeta::from(&response);
        debug!(%method, path, status = meta.status(), "API response");

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return Attempt::err(err.into(), Some(meta)),
        };
        if !meta.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Attempt::err(ProviderError::api(meta.status(), body), Some(meta));
        }

        let decoded = if bytes.is_empty() {
            serde_json::from_slice(b"null")
        } else {
            serde_json::from_slice(&bytes)
        };
        match decoded {
            Ok(value) => Attempt::ok(value, meta),
            Err(err) => Attempt::err(err.into(), Some(meta)),
        }
    }
}
