//! Rate-limited HTTP client for the GitHub REST API.
//!
//! Every request waits on a governor limiter sized from the configured
//! hourly budget. Responses are classified into transient and permanent
//! tracker errors so the synchronizer knows what to retry.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use super::models::ErrorResponse;
use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::TrackerConfig;
use crate::domain::ports::{TrackerError, TrackerResult};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("cadre/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub api_base: String,
    pub token: String,
    pub requests_per_hour: u32,
    pub timeout: Duration,
}

impl GithubClientConfig {
    /// Build from tracker config, reading the token from the named
    /// environment variable.
    pub fn from_tracker(config: &TrackerConfig) -> DomainResult<Self> {
        let token = std::env::var(&config.token_env).map_err(|_| {
            OrchestrationError::Validation(format!(
                "issue tracker token variable {} is not set",
                config.token_env
            ))
        })?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            requests_per_hour: config.requests_per_hour,
            timeout: Duration::from_secs(30),
        })
    }
}

pub struct GithubClient {
    http: Client,
    config: GithubClientConfig,
    limiter: DefaultDirectRateLimiter,
}

impl GithubClient {
    pub fn new(config: GithubClientConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| OrchestrationError::Validation(format!("HTTP client: {e}")))?;
        let per_hour = NonZeroU32::new(config.requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            http,
            limiter: RateLimiter::direct(Quota::per_hour(per_hour)),
            config,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.config.api_base))
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.config.token)
    }

    pub async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> TrackerResult<Response> {
        self.limiter.until_ready().await;
        let mut request = self.request(method.clone(), path);
        if let Some(body) = body {
            request = request.json(body);
        }
        debug!(%method, path, "github request");
        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::Transient(format!("request failed: {e}")))?;
        classify(response).await
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> TrackerResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send(method, path, body)
            .await?
            .json::<T>()
            .await
            .map_err(|e| TrackerError::Permanent(format!("unexpected response body: {e}")))
    }
}

/// Pass successes through; map failures by status.
async fn classify(response: Response) -> TrackerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .is_some_and(|v| v.as_bytes() == b"0"));
    let message = response
        .json::<ErrorResponse>()
        .await
        .map(|e| e.message)
        .unwrap_or_default();
    let detail = format!("{status}: {message}");

    if rate_limited || status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(TrackerError::Transient(detail))
    } else {
        Err(TrackerError::Permanent(detail))
    }
}
