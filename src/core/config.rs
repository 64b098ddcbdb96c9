use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use url::Url;

use crate::errors::FetchError;

pub const DEFAULT_TIMEOUT_MS: i64 = 5_000;
pub const DEFAULT_MAX_RETRY: i64 = 3;
pub const DEFAULT_RETRY_DELAY_MS: i64 = 1_000;
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;
pub const DEFAULT_RETRY_STATUS_CODES: &[u16] = &[500, 502, 503, 504];
pub const DEFAULT_RETRY_METHODS: &[&str] = &["GET", "PUT", "DELETE"];

/// Unvalidated client options, as read from callers, JSON or the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchOptions {
    #[serde(alias = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(alias = "timeout")]
    pub timeout_ms: Option<i64>,
    #[serde(alias = "maxRetry")]
    pub max_retry: Option<i64>,
    #[serde(alias = "retryDelay")]
    pub retry_delay_ms: Option<i64>,
    #[serde(alias = "backoffBase")]
    pub backoff_base: Option<f64>,
    #[serde(alias = "retryStatusCodes")]
    pub retry_status_codes: Option<Vec<i64>>,
    #[serde(alias = "retryMethods")]
    pub retry_methods: Option<Vec<String>>,
    #[serde(alias = "defaultHeaders")]
    pub default_headers: Option<BTreeMap<String, String>>,
}

/// Retry tuning shared by every request issued through one client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retry: u32,
    pub retry_delay: Duration,
    pub backoff_base: f64,
    pub statuses: BTreeSet<u16>,
    pub methods: Vec<Method>,
}

impl RetryPolicy {
    #[must_use]
    pub fn allows_status(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    #[must_use]
    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Network failures always qualify. HTTP errors need both a retryable
    /// status and a retryable method.
    #[must_use]
    pub fn should_retry(&self, error: &FetchError, method: &Method) -> bool {
        match error {
            FetchError::Network { .. } => true,
            FetchError::Http { response } => {
                self.allows_status(response.status.as_u16()) && self.allows_method(method)
            }
            _ => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY as u32,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS as u64),
            backoff_base: DEFAULT_BACKOFF_BASE,
            statuses: DEFAULT_RETRY_STATUS_CODES.iter().copied().collect(),
            methods: vec![Method::GET, Method::PUT, Method::DELETE],
        }
    }
}

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: Option<Url>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub default_headers: HeaderMap,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS as u64),
            retry: RetryPolicy::default(),
            default_headers: HeaderMap::new(),
        }
    }
}

impl FetchOptions {
    /// Reads options from `FETCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the variable when a value cannot be parsed.
    pub fn from_env() -> Result<Self, FetchError> {
        Ok(Self {
            base_url: env_string("FETCH_BASE_URL"),
            timeout_ms: env_parse("FETCH_TIMEOUT_MS")?,
            max_retry: env_parse("FETCH_MAX_RETRY")?,
            retry_delay_ms: env_parse("FETCH_RETRY_DELAY_MS")?,
            backoff_base: env_parse("FETCH_BACKOFF_BASE")?,
            retry_status_codes: env_list("FETCH_RETRY_STATUS_CODES")?,
            retry_methods: env_string("FETCH_RETRY_METHODS").map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            default_headers: None,
        })
    }

    /// Applies defaults and checks every option.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Validation` for the first option that is out of range.
    pub fn validate(self) -> Result<FetchConfig, FetchError> {
        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms <= 0 {
            return Err(FetchError::validation(
                "timeout",
                format!("must be a positive number of milliseconds, got {timeout_ms}"),
            ));
        }

        let max_retry = self.max_retry.unwrap_or(DEFAULT_MAX_RETRY);
        let max_retry = u32::try_from(max_retry).map_err(|_| {
            FetchError::validation(
                "maxRetry",
                format!("must be a non-negative integer, got {max_retry}"),
            )
        })?;

        let retry_delay_ms = self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);
        if retry_delay_ms < 0 {
            return Err(FetchError::validation(
                "retryDelay",
                format!("must not be negative, got {retry_delay_ms}"),
            ));
        }

        let backoff_base = self.backoff_base.unwrap_or(DEFAULT_BACKOFF_BASE);
        if !backoff_base.is_finite() || backoff_base < 1.0 {
            return Err(FetchError::validation(
                "backoffBase",
                format!("must be a finite number >= 1, got {backoff_base}"),
            ));
        }

        let statuses = match self.retry_status_codes {
            Some(codes) => codes
                .into_iter()
                .map(|code| {
                    u16::try_from(code)
                        .ok()
                        .filter(|c| (100..=599).contains(c))
                        .ok_or_else(|| {
                            FetchError::validation(
                                "retryStatusCodes",
                                format!("{code} is not an HTTP status code"),
                            )
                        })
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
            None => DEFAULT_RETRY_STATUS_CODES.iter().copied().collect(),
        };

        let methods = match self.retry_methods {
            Some(names) => names
                .iter()
                .map(|name| parse_method(name))
                .collect::<Result<Vec<_>, _>>()?,
            None => DEFAULT_RETRY_METHODS
                .iter()
                .map(|name| parse_method(name))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let base_url = match self.base_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                FetchError::validation("baseUrl", format!("`{raw}` is not an absolute URL: {e}"))
            })?),
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in self.default_headers.unwrap_or_default() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FetchError::validation("defaultHeaders", format!("bad header name `{name}`: {e}"))
            })?;
            let header_value = HeaderValue::from_str(&value).map_err(|e| {
                FetchError::validation("defaultHeaders", format!("bad value for `{name}`: {e}"))
            })?;
            default_headers.insert(header_name, header_value);
        }

        Ok(FetchConfig {
            base_url,
            timeout: Duration::from_millis(timeout_ms as u64),
            retry: RetryPolicy {
                max_retry,
                retry_delay: Duration::from_millis(retry_delay_ms as u64),
                backoff_base,
                statuses,
                methods,
            },
            default_headers,
        })
    }
}

fn parse_method(name: &str) -> Result<Method, FetchError> {
    let upper = name.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(FetchError::validation("retryMethods", "empty method name"));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| {
        FetchError::validation("retryMethods", format!("`{name}` is not an HTTP method"))
    })
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, FetchError>
where
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| FetchError::validation(key, format!("`{raw}`: {e}")))
        })
        .transpose()
}

fn env_list(key: &str) -> Result<Option<Vec<i64>>, FetchError> {
    env_string(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|item| {
                    item.parse::<i64>()
                        .map_err(|e| FetchError::validation(key, format!("`{item}`: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
}
