//! Mock servers and fixtures shared by unit tests.
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::shared::network::http::config::{HttpArgs, ProxyArgs, RetryArgs};

/// Deterministic, non-repeating-looking payload.
pub fn sample_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 251) as u8).collect()
}

/// Client settings for tests: no proxy, one retry, short timeout.
pub fn test_http_args() -> HttpArgs {
    HttpArgs {
        retry_args: RetryArgs::new(1),
        proxy_args: ProxyArgs { no_proxy: true, ..ProxyArgs::default() },
        timeout: 10,
        ..HttpArgs::default()
    }
}

/// URL on a local port nothing listens on.
pub fn unused_port_url() -> Url {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("bind ephemeral port");
    Url::parse(&format!("http://127.0.0.1:{port}/file")).expect("valid url")
}

fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let bounds = value.strip_prefix("bytes=")?;
    let (start, end) = bounds.split_once('-')?;
    let end = if end.is_empty() { None } else { Some(end.parse().ok()?) };
    Some((start.parse().ok()?, end))
}

/// Serves `body` honouring `Range` headers, like a static file server.
///
/// A ranged request starting at `fail_at` gets a 500 instead.
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
    fail_at: Option<u64>,
    hits: Arc<AtomicUsize>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let range = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_range);
        let Some((start, end)) = range else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.as_ref().clone());
        };
        if Some(start) == self.fail_at {
            return ResponseTemplate::new(500);
        }
        let len = self.body.len() as u64;
        if start >= len {
            return ResponseTemplate::new(416).insert_header("content-range", format!("bytes */{len}").as_str());
        }
        let end = end.unwrap_or(len - 1).min(len - 1);
        ResponseTemplate::new(206)
            .insert_header("content-range", format!("bytes {start}-{end}/{len}").as_str())
            .set_body_bytes(self.body[start as usize..=end as usize].to_vec())
    }
}

/// Starts a server with `body` at `/file`; returns it, the file URL and a hit counter.
pub async fn range_server(body: Vec<u8>, fail_at: Option<u64>) -> (MockServer, Url, Arc<AtomicUsize>) {
    let server = MockServer::start().await;
    let hits = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/file"))
        .respond_with(RangeResponder {
            body: Arc::new(body),
            fail_at,
            hits: Arc::clone(&hits),
        })
        .mount(&server)
        .await;
    let url = Url::parse(&format!("{}/file", server.uri())).expect("mock url");
    (server, url, hits)
}
