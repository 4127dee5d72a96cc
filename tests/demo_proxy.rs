mod common;

use common::{decode_chunked, send_raw, start_server, Fixed};
use httpwire::demo::{DemoHandler, Upstream};
use sha2::{Digest, Sha256};

const UPSTREAM_BODY: &[u8] = b"The quick brown fox jumps over the lazy dog, then naps in the sun....";

#[tokio::test]
async fn httpbin_route_relays_upstream_with_trailers() {
    assert_eq!(UPSTREAM_BODY.len(), 69);
    let upstream = start_server(Fixed(UPSTREAM_BODY)).await;
    let base = format!("http://{}/", upstream.local_addr());

    let handler = DemoHandler::new("assets", Upstream::new(&base).unwrap());
    let server = start_server(handler).await;
    let response = send_raw(
        server.local_addr(),
        b"GET /httpbin/stream/1 HTTP/1.1\r\nHost: localhost\r\n\r\n",
    )
    .await;

    let (head, body, trailers) = decode_chunked(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"), "{head}");
    assert!(head.contains("transfer-encoding: chunked\r\n"));
    assert!(head.contains("trailer: X-Content-SHA256, X-Content-Length\r\n"));
    assert_eq!(body, UPSTREAM_BODY);

    let digest = format!("{:x}", Sha256::digest(UPSTREAM_BODY));
    assert_eq!(
        trailers,
        vec![
            format!("x-content-sha256: {digest}"),
            "x-content-length: 69".to_string(),
        ]
    );
}

#[tokio::test]
async fn other_routes_stay_local() {
    let handler = DemoHandler::new("assets", Upstream::new("http://127.0.0.1:9/").unwrap());
    let server = start_server(handler).await;

    let response = send_raw(server.local_addr(), b"GET /yourproblem HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));

    let response = send_raw(server.local_addr(), b"GET /anything HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
}
