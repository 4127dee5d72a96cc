//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use httpwire::http::{default_headers, BoxFuture, ResponseError};
use httpwire::{
    serve_with_config, Handler, Request, ResponseWriter, ServerConfig, ServerHandle, StatusCode,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Responds with `"<METHOD> <target> <body>"` as text/plain.
pub struct Echo;

impl Handler for Echo {
    fn handle<'a>(
        &'a self,
        writer: &'a mut ResponseWriter<TcpStream>,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), ResponseError>> {
        Box::pin(async move {
            let body = format!(
                "{} {} {}",
                request.method(),
                request.target(),
                String::from_utf8_lossy(&request.body)
            );
            writer.write_status_line(StatusCode::Ok).await?;
            writer.write_headers(&default_headers(body.len())).await?;
            writer.write_body(body.as_bytes()).await?;
            Ok(())
        })
    }
}

/// Responds with a fixed body.
pub struct Fixed(pub &'static [u8]);

impl Handler for Fixed {
    fn handle<'a>(
        &'a self,
        writer: &'a mut ResponseWriter<TcpStream>,
        _request: &'a Request,
    ) -> BoxFuture<'a, Result<(), ResponseError>> {
        Box::pin(async move {
            writer.write_status_line(StatusCode::Ok).await?;
            writer.write_headers(&default_headers(self.0.len())).await?;
            writer.write_body(self.0).await?;
            Ok(())
        })
    }
}

/// Start a server on an ephemeral loopback port.
pub async fn start_server<H: Handler>(handler: H) -> ServerHandle {
    start_server_with(handler, |_| {}).await
}

/// Start a server after letting the caller adjust the configuration.
pub async fn start_server_with<H: Handler>(
    handler: H,
    configure: impl FnOnce(&mut ServerConfig),
) -> ServerHandle {
    let mut config = ServerConfig::with_port(0);
    config.listener.bind_address = "127.0.0.1".into();
    configure(&mut config);
    serve_with_config(config, handler).await.unwrap()
}

/// Send `raw` and read everything the server writes until it closes.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    read_all(&mut stream).await
}

/// Read until EOF, giving up after five seconds.
///
/// A reset from the server (closing with unread input) reads as empty.
pub async fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    match tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await {
        Ok(Ok(_)) => response,
        Ok(Err(_)) => Vec::new(),
        Err(_) => panic!("server did not close the connection"),
    }
}

/// Split a raw chunked response into (head, body, trailer lines).
pub fn decode_chunked(raw: &[u8]) -> (String, Vec<u8>, Vec<String>) {
    let text = raw;
    let head_end = find(text, b"\r\n\r\n").expect("response head") + 4;
    let head = String::from_utf8_lossy(&text[..head_end]).into_owned();

    let mut pos = head_end;
    let mut body = Vec::new();
    loop {
        let line_end = pos + find(&text[pos..], b"\r\n").expect("chunk size line");
        let size_line = std::str::from_utf8(&text[pos..line_end]).unwrap();
        let size = usize::from_str_radix(size_line, 16).unwrap();
        pos = line_end + 2;
        if size == 0 {
            break;
        }
        body.extend_from_slice(&text[pos..pos + size]);
        assert_eq!(&text[pos + size..pos + size + 2], b"\r\n");
        pos += size + 2;
    }

    let trailers = String::from_utf8_lossy(&text[pos..])
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    (head, body, trailers)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
