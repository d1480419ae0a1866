//! Transport client: timeout, retry with linear backoff, failure
//! classification, JSON verbs.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{HttpBackend, ReqwestBackend};
use crate::config::ApiConfig;
use crate::error::{ApiError, FailureDetails, TransportFailure};
use crate::request::{
    HttpRequest, HttpResponse, Method, MultipartForm, RequestBody, RequestDescriptor,
};

/// Bounded retry schedule.
///
/// Attempts run strictly one after another; after attempt `k` fails with a
/// retryable failure the client waits `base_delay * k` before attempt `k + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included (never less than 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// All inter-attempt delays, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}

/// Issues requests against the configured backend.
///
/// Holds no mutable state; calls are independent and may run concurrently.
pub struct TransportClient<B = ReqwestBackend> {
    backend: B,
    config: ApiConfig,
    policy: RetryPolicy,
}

impl TransportClient<ReqwestBackend> {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_backend(config, ReqwestBackend::new())
    }
}

impl<B: HttpBackend> TransportClient<B> {
    pub fn with_backend(config: ApiConfig, backend: B) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            backend,
            config,
            policy,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Absolute URL for a request path.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url, path)
        }
    }

    fn build_request(&self, descriptor: &RequestDescriptor) -> HttpRequest {
        let mut headers: Vec<(String, String)> = Vec::new();
        if !matches!(descriptor.body, Some(RequestBody::Multipart(_))) {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        for (name, value) in &descriptor.headers {
            match headers
                .iter_mut()
                .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            {
                Some(slot) => slot.1 = value.clone(),
                None => headers.push((name.clone(), value.clone())),
            }
        }

        HttpRequest {
            method: descriptor.method,
            url: self.resolve_url(&descriptor.path),
            headers,
            body: descriptor.body.clone(),
        }
    }

    /// One exchange under the per-attempt timeout. On expiry the in-flight
    /// future is dropped, which cancels it.
    async fn attempt(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let timeout = self.config.timeout();

        let response = match tokio::time::timeout(timeout, self.backend.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(TransportFailure::network(err.to_string())),
            Err(_elapsed) => {
                return Err(TransportFailure::network(format!(
                    "request timed out after {}ms",
                    timeout.as_millis()
                )))
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        let details = FailureDetails::from_body(&response.body, &response.status_text);
        Err(TransportFailure::http(
            response.status,
            &response.status_text,
            details,
        ))
    }

    /// Execute a request with timeout and bounded retry.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<HttpResponse, TransportFailure> {
        let request = self.build_request(descriptor);
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;

        loop {
            let failure = match self.attempt(request.clone()).await {
                Ok(response) => {
                    debug!(
                        method = %descriptor.method,
                        path = %descriptor.path,
                        status = response.status,
                        attempt,
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            if attempt >= max_attempts || !failure.is_retryable() {
                warn!(
                    event = "transport.failed",
                    method = %descriptor.method,
                    path = %descriptor.path,
                    status = %failure.status,
                    attempt,
                    error = %failure,
                );
                return Err(failure);
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                event = "transport.retry",
                method = %descriptor.method,
                path = %descriptor.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(&RequestDescriptor::get(path)).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn post<T, P>(&self, path: &str, payload: &P) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let descriptor = RequestDescriptor::new(Method::Post, path).with_json(payload)?;
        let response = self.execute(&descriptor).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn put<T, P>(&self, path: &str, payload: &P) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let descriptor = RequestDescriptor::new(Method::Put, path).with_json(payload)?;
        let response = self.execute(&descriptor).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// `DELETE`; a 204 (or empty) response decodes to `None`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let response = self.execute(&RequestDescriptor::delete(path)).await?;
        if response.status == 204 || response.body.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&response.body)?))
    }

    /// `POST` a multipart form.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<T, ApiError> {
        let descriptor = RequestDescriptor::new(Method::Post, path).with_form(form);
        let response = self.execute(&descriptor).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }
}
