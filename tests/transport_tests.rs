//! End-to-end checks of the reqwest transport against a loopback HTTP responder.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use memo_fetch::{FetchClient, FetchError, FetchOptions, RequestOptions};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Canned reply for every connection; the request head is echoed when `body` is `None`.
#[derive(Clone)]
struct Canned {
    status: &'static str,
    body: Option<&'static str>,
    delay: Duration,
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn spawn_server(canned: Canned) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let canned = canned.clone();
            tokio::spawn(async move {
                let head = read_head(&mut stream).await;
                tokio::time::sleep(canned.delay).await;
                let body = canned.body.map_or(head, str::to_string);
                let reply = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    canned.status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), hits)
}

fn client_for(base_url: &str, options: FetchOptions) -> FetchClient {
    FetchClient::new(FetchOptions {
        base_url: Some(base_url.to_string()),
        ..options
    })
    .unwrap()
}

#[tokio::test]
async fn test_json_round_trip_over_loopback() {
    let (base, hits) = spawn_server(Canned {
        status: "200 OK",
        body: Some(r#"{"id":1,"title":"memo"}"#),
        delay: Duration::ZERO,
    })
    .await;
    let client = client_for(&base, FetchOptions::default());

    let body = client.get("/memos/1", RequestOptions::new()).await.unwrap();

    assert_eq!(body.as_json(), Some(&json!({"id": 1, "title": "memo"})));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_line_and_headers_reach_server() {
    let (base, _hits) = spawn_server(Canned {
        status: "200 OK",
        body: None,
        delay: Duration::ZERO,
    })
    .await;
    let client = client_for(
        &format!("{base}/rest/v1"),
        FetchOptions {
            default_headers: Some([("apikey".to_string(), "anon".to_string())].into()),
            ..FetchOptions::default()
        },
    );

    let echoed = client
        .get(
            "tags",
            RequestOptions::new()
                .with_query("order", "name.asc")
                .response_type(memo_fetch::ResponseType::Text),
        )
        .await
        .unwrap();
    let head = echoed.as_text().unwrap().to_ascii_lowercase();

    assert!(head.starts_with("get /rest/v1/tags?order=name.asc http/1.1"), "{head}");
    assert!(head.contains("apikey: anon"), "{head}");
}

#[tokio::test]
async fn test_server_error_is_http_error() {
    let (base, _hits) = spawn_server(Canned {
        status: "500 Internal Server Error",
        body: Some(r#"{"error":"boom"}"#),
        delay: Duration::ZERO,
    })
    .await;
    let client = client_for(&base, FetchOptions::default());

    let err = client.get("/memos", RequestOptions::new()).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.response().unwrap().text_lossy(), r#"{"error":"boom"}"#);
}

#[tokio::test]
async fn test_retries_hit_the_server_each_time() {
    let (base, hits) = spawn_server(Canned {
        status: "503 Service Unavailable",
        body: Some("{}"),
        delay: Duration::ZERO,
    })
    .await;
    let client = client_for(
        &base,
        FetchOptions {
            max_retry: Some(2),
            retry_delay_ms: Some(5),
            ..FetchOptions::default()
        },
    );

    let err = client
        .get("/memos", RequestOptions::new().retry(true))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::RetryLimitExceeded { attempts: 3, .. }
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (base, _hits) = spawn_server(Canned {
        status: "200 OK",
        body: Some("{}"),
        delay: Duration::from_secs(10),
    })
    .await;
    let client = client_for(
        &base,
        FetchOptions {
            timeout_ms: Some(100),
            ..FetchOptions::default()
        },
    );

    let err = client.get("/memos", RequestOptions::new()).await.unwrap_err();

    assert!(err.is_timeout(), "{err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{addr}"), FetchOptions::default());
    let err = client.get("/memos", RequestOptions::new()).await.unwrap_err();

    assert!(err.is_network(), "{err:?}");
    assert!(!err.is_timeout());
}
