use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use memo_fetch::{FetchClient, FetchOptions, RequestOptions, ResponseBody, ResponseType};
use reqwest::Method;
use tracing::info;

/// Issue a single request through the retrying client and print the body.
#[derive(Debug, Parser)]
#[command(name = "memo-fetch", version)]
struct Cli {
    /// Absolute URL, or a path resolved against the base URL
    target: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    #[arg(long, env = "FETCH_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "FETCH_TIMEOUT_MS")]
    timeout_ms: Option<i64>,

    #[arg(long, env = "FETCH_MAX_RETRY")]
    max_retry: Option<i64>,

    #[arg(long, env = "FETCH_RETRY_DELAY_MS")]
    retry_delay_ms: Option<i64>,

    /// Enable automatic retries for transient failures
    #[arg(long)]
    retry: bool,

    /// Response type: json, text, blob or arraybuffer
    #[arg(long = "type", default_value = "json")]
    response_type: String,

    /// JSON request body
    #[arg(short, long)]
    data: Option<String>,

    /// Extra header as `Name: value`; repeatable
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Per-request timeout override in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    memo_fetch::setup_logging();
    let cli = Cli::parse();

    let client = FetchClient::new(FetchOptions {
        base_url: cli.base_url.clone(),
        timeout_ms: cli.timeout_ms,
        max_retry: cli.max_retry,
        retry_delay_ms: cli.retry_delay_ms,
        ..FetchOptions::from_env()?
    })?;

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method `{}`", cli.method))?;
    let response_type: ResponseType = cli.response_type.parse()?;

    let mut options = RequestOptions::new()
        .method(method)
        .response_type(response_type)
        .retry(cli.retry);
    for raw in &cli.headers {
        let Some((name, value)) = raw.split_once(':') else {
            bail!("header `{raw}` must look like `Name: value`");
        };
        options = options.with_header(name.trim(), value.trim());
    }
    if let Some(data) = &cli.data {
        let body = serde_json::from_str(data).context("--data must be valid JSON")?;
        options = options.json(body);
    }
    if let Some(ms) = cli.request_timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }

    info!("Requesting {}", cli.target);
    let body = client.request(&cli.target, options).await?;

    let mut stdout = std::io::stdout().lock();
    match body {
        ResponseBody::Json(value) => writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?,
        ResponseBody::Text(text) => writeln!(stdout, "{text}")?,
        ResponseBody::Blob(blob) => stdout.write_all(&blob.bytes)?,
        ResponseBody::ArrayBuffer(bytes) => stdout.write_all(&bytes)?,
    }

    Ok(())
}
