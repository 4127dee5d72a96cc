//! Relaying an upstream body as a chunked response with digest trailers.

use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;
use url::Url;

use crate::demo::pages;
use crate::http::headers::Headers;
use crate::http::response::{default_headers, ResponseError, ResponseWriter, StatusCode};

/// Largest chunk written to the client.
pub const RELAY_CHUNK_SIZE: usize = 32;

pub const TRAILER_SHA256: &str = "X-Content-SHA256";
pub const TRAILER_LENGTH: &str = "X-Content-Length";

/// Streams bytes as chunks while hashing and counting them.
#[derive(Default)]
pub struct ChunkedRelay {
    hasher: Sha256,
    length: usize,
}

impl ChunkedRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response head announcing a chunked body and the digest trailers.
    pub fn response_headers() -> Headers {
        let mut headers = default_headers(0);
        headers.remove("Content-Length");
        headers.replace("Content-Type", "text/plain");
        headers.set("Transfer-Encoding", "chunked");
        headers.set("Trailer", TRAILER_SHA256);
        headers.set("Trailer", TRAILER_LENGTH);
        headers
    }

    /// Write `data` as one or more chunks of at most [`RELAY_CHUNK_SIZE`] bytes.
    pub async fn relay<W>(
        &mut self,
        writer: &mut ResponseWriter<W>,
        data: &[u8],
    ) -> Result<(), ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        for piece in data.chunks(RELAY_CHUNK_SIZE) {
            writer.write_chunk(piece).await?;
        }
        self.hasher.update(data);
        self.length += data.len();
        Ok(())
    }

    /// Bytes relayed so far.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Terminate the body and write the digest trailers.
    pub async fn finish<W>(self, writer: &mut ResponseWriter<W>) -> Result<Headers, ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_chunked_body_done().await?;
        let mut trailers = Headers::new();
        trailers.set(TRAILER_SHA256, format!("{:x}", self.hasher.finalize()));
        trailers.set(TRAILER_LENGTH, self.length.to_string());
        writer.write_headers(&trailers).await?;
        Ok(trailers)
    }
}

/// Fetches content from an upstream HTTP service.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    base: Url,
}

impl Upstream {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Fetch `path` relative to the base URL and relay it chunked.
    ///
    /// If the upstream cannot be reached the 500 page is sent instead. If the
    /// upstream body breaks off, the response ends without the terminating
    /// chunk or trailers.
    pub async fn relay<W>(
        &self,
        writer: &mut ResponseWriter<W>,
        path: &str,
    ) -> Result<(), ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        let url = match self.base.join(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(path, error = %e, "Invalid upstream path");
                return pages::respond_page(writer, StatusCode::InternalServerError).await;
            }
        };

        let mut response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Upstream request failed");
                return pages::respond_page(writer, StatusCode::InternalServerError).await;
            }
        };

        writer.write_status_line(StatusCode::Ok).await?;
        writer.write_headers(&ChunkedRelay::response_headers()).await?;

        let mut relay = ChunkedRelay::new();
        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => relay.relay(writer, &bytes).await?,
                Ok(None) => break,
                Err(e) => {
                    // No terminating chunk, so the client sees a truncated body.
                    tracing::error!(
                        %url,
                        error = %e,
                        bytes = relay.len(),
                        "Upstream body interrupted; closing without trailers"
                    );
                    return Ok(());
                }
            }
        }

        let relayed = relay.len();
        relay.finish(writer).await?;
        tracing::debug!(%url, bytes = relayed, "Upstream body relayed");
        Ok(())
    }
}
