//! Integration tests for the fixture server, driven over real HTTP with reqwest.
//!
//! The default layout is 8 blocks of 16 bytes followed by 64 zero bytes, so the
//! served file is 192 bytes long and byte `i < 128` has value `i / 16`.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use more_asserts::assert_gt;
use range_fixture::responder::http_date;
use range_fixture::{CursorMode, FixtureConfig, ModifiedTime, TestServer, start_test_server};
use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED,
    RANGE,
};
use tokio::net::TcpStream;

fn header<'a>(response: &'a reqwest::Response, name: reqwest::header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn expected_byte(i: usize) -> u8 {
    if i < 128 { (i / 16) as u8 } else { 0 }
}

async fn start_with(config: FixtureConfig) -> TestServer {
    TestServer::try_start(config).await.unwrap()
}

#[tokio::test]
async fn test_full_get() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, CONTENT_LENGTH), Some("192"));
    assert_eq!(header(&response, ACCEPT_RANGES), Some("bytes"));
    assert_eq!(header(&response, CONTENT_TYPE), Some("application/octet-stream"));
    assert!(header(&response, LAST_MODIFIED).is_some());

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 192);
    for (i, b) in body.iter().enumerate() {
        assert_eq!(*b, expected_byte(i), "byte {i}");
    }
    assert_eq!(body[100], 6);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_open_range_crosses_into_padding() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).header(RANGE, "bytes=120-").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, CONTENT_RANGE), Some("bytes 120-191/192"));
    assert_eq!(header(&response, CONTENT_LENGTH), Some("72"));

    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..8], &[7; 8]);
    assert!(body[8..].iter().all(|b| *b == 0));

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_range_in_padding() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).header(RANGE, "bytes=170-").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, CONTENT_RANGE), Some("bytes 170-191/192"));
    assert_eq!(response.bytes().await.unwrap().as_ref(), &[0; 22]);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_suffix_range() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).header(RANGE, "bytes=-10").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, CONTENT_RANGE), Some("bytes 182-191/192"));
    assert_eq!(response.bytes().await.unwrap().len(), 10);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unsatisfiable_range() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).header(RANGE, "bytes=500-").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header(&response, CONTENT_RANGE), Some("bytes */192"));

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_head() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.head(server.base_url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, CONTENT_LENGTH), Some("192"));
    assert!(response.bytes().await.unwrap().is_empty());

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_multiple_ranges() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).header(RANGE, "bytes=16-31,100-103").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

    let content_type = header(&response, CONTENT_TYPE).unwrap().to_string();
    let boundary = content_type.strip_prefix("multipart/byteranges; boundary=").unwrap().to_string();
    let length: usize = header(&response, CONTENT_LENGTH).unwrap().parse().unwrap();
    assert_gt!(length, 20);

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), length);

    let text = String::from_utf8_lossy(&body);
    assert!(text.starts_with(&format!("--{boundary}\r\n")));
    assert!(text.contains("Content-Range: bytes 16-31/192"));
    assert!(text.contains("Content-Range: bytes 100-103/192"));
    assert!(text.ends_with(&format!("\r\n--{boundary}--\r\n")));

    let first = body.windows(16).position(|w| w == [1; 16]).unwrap();
    assert!(text[..first].ends_with("\r\n\r\n"));
    let second = body.windows(4).position(|w| w == [6; 4]).unwrap();
    assert_gt!(second, first);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_if_modified_since() {
    let modified = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 45).unwrap();
    let server = start_with(FixtureConfig {
        modified: ModifiedTime::Fixed(modified),
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.base_url())
        .header(IF_MODIFIED_SINCE, http_date(modified))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(response.bytes().await.unwrap().is_empty());

    let earlier = modified - chrono::Duration::hours(1);
    let response = client
        .get(server.base_url())
        .header(IF_MODIFIED_SINCE, http_date(earlier))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, LAST_MODIFIED), Some("Sat, 09 Mar 2024 12:30:45 GMT"));

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stale_if_range() {
    let modified = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 45).unwrap();
    let server = start_with(FixtureConfig {
        modified: ModifiedTime::Fixed(modified),
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let stale = http_date(modified - chrono::Duration::days(1));
    let response = client
        .get(server.base_url())
        .header(RANGE, "bytes=0-9")
        .header(IF_RANGE, stale)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().len(), 192);

    let response = client
        .get(server.base_url())
        .header(RANGE, "bytes=0-9")
        .header(IF_RANGE, http_date(modified))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shared_cursor_follows_requests() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    client.get(server.base_url()).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(server.stream().position(), 192);

    let response = client.get(server.base_url()).header(RANGE, "bytes=10-19").send().await.unwrap();
    response.bytes().await.unwrap();
    assert_eq!(server.stream().position(), 20);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_per_request_cursor_is_isolated() {
    let server = start_with(FixtureConfig {
        cursor_mode: CursorMode::PerRequest,
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    let body = client.get(server.base_url()).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(body.len(), 192);
    assert_eq!(server.stream().position(), 0);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_every_path_and_method_is_served() {
    let server = TestServer::start(16, 8, 64).await;
    let client = reqwest::Client::new();

    let url = format!("{}some/sub/path", server.base_url());
    let response = client.get(url).header(RANGE, "bytes=100-103").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.bytes().await.unwrap().as_ref(), &[6; 4]);

    let response = client.post(server.base_url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, CONTENT_LENGTH), Some("192"));
    assert_eq!(response.bytes().await.unwrap().len(), 192);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_non_get_preconditions() {
    let modified = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 45).unwrap();
    let server = start_with(FixtureConfig {
        modified: ModifiedTime::Fixed(modified),
        ..Default::default()
    })
    .await;
    let client = reqwest::Client::new();

    // If-Modified-Since only applies to GET and HEAD.
    let response = client
        .post(server.base_url())
        .header(IF_MODIFIED_SINCE, http_date(modified))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.bytes().await.unwrap();

    let response = client.put(server.base_url()).header(IF_NONE_MATCH, "*").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    let response = client.get(server.base_url()).header(IF_NONE_MATCH, "*").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (base_url, shutdown) = start_test_server(16, 8, 64).await;
    assert!(base_url.starts_with("http://127.0.0.1:"));
    assert!(base_url.ends_with('/'));

    let client = reqwest::Client::new();
    let response = client.get(&base_url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.bytes().await.unwrap();
    drop(client);

    let addr = base_url.trim_start_matches("http://").trim_end_matches('/').to_string();
    shutdown.shutdown().await.unwrap();

    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_body() {
    const TOTAL: usize = 64 << 20;
    let server = TestServer::start(1 << 20, 64, 0).await;
    let client = reqwest::Client::new();

    let mut response = client.get(server.base_url()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut received = response.chunk().await.unwrap().unwrap().len();
    assert_gt!(received, 0);

    let shutdown = tokio::spawn(server.shutdown());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!shutdown.is_finished());

    while let Some(chunk) = response.chunk().await.unwrap() {
        received += chunk.len();
    }
    assert_eq!(received, TOTAL);

    drop(client);
    shutdown.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bounded_shutdown_of_idle_server() {
    let server = start_with(FixtureConfig {
        shutdown_timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .await;
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_servers_get_distinct_ports() {
    let a = TestServer::start(16, 8, 64).await;
    let b = TestServer::start(4, 2, 0).await;
    assert_ne!(a.local_addr(), b.local_addr());

    let body = reqwest::get(b.base_url()).await.unwrap().bytes().await.unwrap();
    assert_eq!(body.as_ref(), &[0, 0, 0, 0, 1, 1, 1, 1]);

    a.shutdown().await.unwrap();
    b.shutdown().await.unwrap();
}
