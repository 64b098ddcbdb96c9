//! Transport strategies used by [`FetchClient`](super::FetchClient).
//!
//! A transport performs exactly one HTTP exchange and buffers the whole
//! response. Timeouts, status handling, decoding and retries live in the
//! client, so every transport behaves the same way under it.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::core::models::HttpResponse;

/// A request ready to be put on the wire.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport timed out")]
    Timeout,

    #[error("{0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a `reqwest::Client`. Clones share one connection pool.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(concat!("memo-fetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build configured HTTP client, using defaults: {}", e);
                Client::new()
            });
        Self { client }
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(Box::new(e))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            url,
            body,
        })
    }
}
