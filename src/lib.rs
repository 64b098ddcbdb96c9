//! memo-fetch - a retrying HTTP client for the memo service backends.
//!
//! Requests are issued against a configured base URL with a bounded
//! per-attempt timeout. Callers may opt in to automatic retries, which back
//! off exponentially with additive jitter for network failures and for
//! retryable status/method combinations.
//!
//! # Architecture
//!
//! The crate uses:
//! - reqwest as the default HTTP transport
//! - tokio for timers and the async runtime
//! - tokio-retry to drive the backoff schedule
//! - tracing for structured diagnostics
//!
//! # Example
//!
//! ```no_run
//! use memo_fetch::{FetchClient, FetchOptions, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     memo_fetch::setup_logging();
//!
//!     let client = FetchClient::new(FetchOptions {
//!         base_url: Some("https://project.supabase.co/rest/v1".to_string()),
//!         timeout_ms: Some(3_000),
//!         ..FetchOptions::default()
//!     })?;
//!
//!     let memos = client
//!         .get("/memos", RequestOptions::new().with_query("select", "*").retry(true))
//!         .await?;
//!     println!("{:?}", memos.as_json());
//!
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod clients;
pub mod core;
pub mod errors;
pub mod utils;

pub use crate::clients::{FetchClient, ReqwestTransport, Transport};
pub use crate::core::{FetchConfig, FetchOptions, RequestOptions, ResponseBody, ResponseType, RetryPolicy};
pub use crate::errors::FetchError;

/// Configure structured logging with JSON output.
///
/// The level filter comes from `RUST_LOG` (default `info`). Calling this
/// more than once is harmless; later calls leave the first subscriber in place.
///
/// # Example
///
/// ```
/// memo_fetch::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
