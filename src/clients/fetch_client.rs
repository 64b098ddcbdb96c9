//! Retrying HTTP client
//!
//! Issues requests against a configured base URL with a per-attempt timeout
//! and an opt-in retry policy for transient failures.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_retry::RetryIf;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use super::transport::{PreparedRequest, ReqwestTransport, Transport, TransportError};
use crate::core::config::{FetchConfig, FetchOptions};
use crate::core::models::{RequestOptions, ResponseBody, ResponseType};
use crate::errors::FetchError;
use crate::utils::backoff::BackoffSchedule;
use crate::utils::urls::resolve_url;

/// HTTP client with bounded timeouts and exponential-backoff retries.
///
/// Cloning is cheap; clones share configuration and transport.
#[derive(Clone)]
pub struct FetchClient {
    config: Arc<FetchConfig>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// Validates `options` and builds a client on the default reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Validation` if any option is out of range.
    pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
        let config = options.validate()?;
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new())))
    }

    /// # Errors
    ///
    /// Returns `FetchError::Validation` if an environment variable holds an invalid value.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::new(FetchOptions::from_env()?)
    }

    #[must_use]
    pub fn with_transport(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// # Errors
    ///
    /// See [`FetchClient::request`].
    pub async fn get(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, FetchError> {
        self.request(path, options.method(Method::GET)).await
    }

    /// # Errors
    ///
    /// See [`FetchClient::request`].
    pub async fn post(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, FetchError> {
        self.request(path, options.method(Method::POST)).await
    }

    /// # Errors
    ///
    /// See [`FetchClient::request`].
    pub async fn put(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, FetchError> {
        self.request(path, options.method(Method::PUT)).await
    }

    /// # Errors
    ///
    /// See [`FetchClient::request`].
    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, FetchError> {
        self.request(path, options.method(Method::DELETE)).await
    }

    /// Shared request path for every verb.
    ///
    /// # Errors
    ///
    /// - `Config` when no method is set, a header is invalid or the URL cannot be resolved
    /// - `Timeout` when an attempt outlives the timeout
    /// - `Network` when the transport fails
    /// - `Http` for non-2xx responses
    /// - `Parse` when a JSON body is malformed
    /// - `RetryLimitExceeded` when retries are enabled and all attempts failed
    pub async fn request(
        &self,
        path: &str,
        mut options: RequestOptions,
    ) -> Result<ResponseBody, FetchError> {
        let method = options
            .method
            .take()
            .ok_or_else(|| FetchError::Config("request method is required".to_string()))?;

        if let Some(name) = options.take_invalid_headers().first() {
            return Err(FetchError::Config(format!("invalid header `{name}`")));
        }

        let url = resolve_url(self.config.base_url.as_ref(), path, &options.query)?;

        options.apply_body_content_type();
        let mut headers = self.config.default_headers.clone();
        headers.extend(options.headers);

        let request = PreparedRequest {
            method,
            url,
            headers,
            body: options.body.into_bytes(),
        };
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let response_type = options.response_type;
        let retry = options.retry;

        let span = info_span!(
            "fetch",
            method = %request.method,
            url = %request.url,
            request_id = %Uuid::new_v4()
        );

        async {
            if retry {
                self.execute_with_retry(&request, timeout, response_type)
                    .await
            } else {
                self.execute(&request, timeout, response_type).await
            }
        }
        .instrument(span)
        .await
    }

    /// GETs `path` and deserializes the JSON body into `T`.
    ///
    /// # Errors
    ///
    /// See [`FetchClient::request`]; a body that does not match `T` is a `Parse` error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        self.get(path, options.response_type(ResponseType::Json))
            .await?
            .into_json()
    }

    /// POSTs `body` as JSON and deserializes the JSON response into `T`.
    ///
    /// # Errors
    ///
    /// See [`FetchClient::get_json`]; `Config` if `body` cannot be serialized.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        let options = options
            .json(to_json_body(body)?)
            .response_type(ResponseType::Json);
        self.post(path, options).await?.into_json()
    }

    /// PUTs `body` as JSON and deserializes the JSON response into `T`.
    ///
    /// # Errors
    ///
    /// See [`FetchClient::post_json`].
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        let options = options
            .json(to_json_body(body)?)
            .response_type(ResponseType::Json);
        self.put(path, options).await?.into_json()
    }

    async fn execute_with_retry(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
        response_type: ResponseType,
    ) -> Result<ResponseBody, FetchError> {
        let policy = &self.config.retry;
        let mut attempts: u32 = 0;

        let schedule = BackoffSchedule::new(policy.clone()).enumerate().map(|(n, delay)| {
            warn!(
                retry = n + 1,
                max_retry = policy.max_retry,
                delay_ms = delay.as_millis() as u64,
                "Retrying request after backoff"
            );
            delay
        });

        let result = RetryIf::spawn(
            schedule,
            || {
                attempts += 1;
                self.execute(request, timeout, response_type)
            },
            |e: &FetchError| {
                let retryable = policy.should_retry(e, &request.method);
                debug!(error_kind = e.kind(), retryable, "Request attempt failed");
                retryable
            },
        )
        .await;

        match result {
            Err(last) if policy.should_retry(&last, &request.method) => {
                error!(
                    attempts,
                    error_kind = last.kind(),
                    "Retry limit exceeded: {}",
                    last
                );
                Err(FetchError::RetryLimitExceeded {
                    attempts,
                    last: Box::new(last),
                })
            }
            other => other,
        }
    }

    async fn execute(
        &self,
        request: &PreparedRequest,
        timeout: Duration,
        response_type: ResponseType,
    ) -> Result<ResponseBody, FetchError> {
        debug!("Sending request");

        let response = match tokio::time::timeout(timeout, self.transport.send(request.clone()))
            .await
        {
            Err(_) | Ok(Err(TransportError::Timeout)) => {
                return Err(FetchError::Timeout { timeout });
            }
            Ok(Err(TransportError::Network(source))) => {
                return Err(FetchError::Network { source });
            }
            Ok(Ok(response)) => response,
        };

        debug!(status = response.status.as_u16(), "Received response");

        if !response.is_success() {
            return Err(FetchError::Http {
                response: Box::new(response),
            });
        }

        ResponseBody::decode(response, response_type)
    }
}

fn to_json_body<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value, FetchError> {
    serde_json::to_value(body)
        .map_err(|e| FetchError::Config(format!("request body is not serializable: {e}")))
}
