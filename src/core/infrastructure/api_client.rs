//! Internal HTTP client for one Proxmox cluster.

use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::{ControlPlaneError, ControlPlaneResult, ValidationError},
        value_object::{ProxmoxApiToken, ProxmoxUrl},
    },
};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{Client, Method, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Proxmox wraps every payload in `{"data": ...}`.
#[derive(Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Why a call failed, before it is folded into a [`ControlPlaneError`].
///
/// Kept separate so adapters can inspect the vendor's message for a
/// specific call (e.g. an id collision on create).
#[derive(Debug)]
pub(crate) enum ApiFailure {
    Transport(String),
    Rejected { status: StatusCode, message: String },
    Decode(String),
}

impl From<ApiFailure> for ControlPlaneError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Transport(message) => ControlPlaneError::RemoteUnavailable(message),
            ApiFailure::Rejected { status, message }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                ControlPlaneError::RemoteUnavailable(format!(
                    "authentication rejected ({}): {}",
                    status, message
                ))
            }
            ApiFailure::Rejected { status, message } => {
                ControlPlaneError::RemoteUnavailable(format!("API error ({}): {}", status, message))
            }
            ApiFailure::Decode(message) => ControlPlaneError::unrecognized("response", message),
        }
    }
}

/// Internal HTTP client that authenticates with an API token and calls the Proxmox API.
///
/// Every request carries the `Authorization: PVEAPIToken=...` header. There is
/// no session and no retry: a `401` is reported to the caller as is.
#[derive(Debug)]
pub struct ApiClient {
    http_client: Client,
    base_url: ProxmoxUrl,
    token: ProxmoxApiToken,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Errors
    /// Returns `ControlPlaneError::Validation` for an unusable rate limit and
    /// `ControlPlaneError::RemoteUnavailable` if the HTTP client cannot be built.
    pub fn new(
        base_url: ProxmoxUrl,
        token: ProxmoxApiToken,
        config: &ControlPlaneConfig,
    ) -> ControlPlaneResult<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ControlPlaneError::RemoteUnavailable(e.to_string()))?;

        let rate_limiter = match config.rate_limit {
            Some(rl) => {
                let per_second = NonZeroU32::new(rl.requests_per_second).ok_or_else(|| {
                    ValidationError::ConstraintViolation(
                        "requests_per_second must be greater than 0".to_string(),
                    )
                })?;
                let burst = NonZeroU32::new(rl.burst_size).ok_or_else(|| {
                    ValidationError::ConstraintViolation(
                        "burst_size must be greater than 0".to_string(),
                    )
                })?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            base_url,
            token,
            rate_limiter,
        })
    }

    /// Performs an authenticated GET request and unwraps `data`.
    pub async fn get<T>(&self, path: &str) -> ControlPlaneResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self
            .execute_request(Method::GET, path, None::<&()>)
            .await?)
    }

    /// Performs an authenticated POST request with a JSON body and unwraps `data`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> ControlPlaneResult<T>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        Ok(self.try_post(path, body).await?)
    }

    /// Like [`post`](Self::post) but leaves the failure uninterpreted.
    pub(crate) async fn try_post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiFailure>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        self.execute_request(Method::POST, path, Some(body)).await
    }

    /// Performs an authenticated DELETE request and unwraps `data`.
    pub async fn delete<T>(&self, path: &str) -> ControlPlaneResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self
            .execute_request(Method::DELETE, path, None::<&()>)
            .await?)
    }

    async fn execute_request<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiFailure>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.base_url.endpoint(path);
        debug!(method = %method, url = %url, "proxmox request");

        let mut req_builder = self
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, self.token.authorization_header());

        if let Some(body) = body {
            req_builder = req_builder.json(body);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| ApiFailure::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(ApiFailure::Rejected { status, message });
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| ApiFailure::Decode(format!("Failed to parse response: {}", e)))
    }
}
