//! Demonstration request handlers used by the `httpwire` binary.
//!
//! # Routes
//! ```text
//! /yourproblem     → 400 page
//! /myproblem       → 500 page
//! /video           → <assets>/vim.mp4 as video/mp4
//! /httpbin/<path>  → <upstream>/<path>, relayed chunked with digest trailers
//! anything else    → 200 page
//! ```

pub mod pages;
pub mod proxy;

use std::path::PathBuf;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;

use crate::http::request::Request;
use crate::http::response::{ResponseError, ResponseWriter, StatusCode};
use crate::http::server::{BoxFuture, Handler};

pub use proxy::{ChunkedRelay, Upstream};

/// Default upstream for `/httpbin/` requests.
pub const DEFAULT_UPSTREAM: &str = "https://httpbin.org/";

const VIDEO_FILE: &str = "vim.mp4";
const PROXY_PREFIX: &str = "/httpbin/";

/// Routes requests to the demonstration responses.
#[derive(Debug, Clone)]
pub struct DemoHandler {
    assets_dir: PathBuf,
    upstream: Upstream,
}

impl DemoHandler {
    pub fn new(assets_dir: impl Into<PathBuf>, upstream: Upstream) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            upstream,
        }
    }

    /// Write the response for `request`.
    pub async fn route<W>(
        &self,
        writer: &mut ResponseWriter<W>,
        request: &Request,
    ) -> Result<(), ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        let target = request.target();
        match target {
            "/yourproblem" => pages::respond_page(writer, StatusCode::BadRequest).await,
            "/myproblem" => pages::respond_page(writer, StatusCode::InternalServerError).await,
            "/video" => self.serve_video(writer).await,
            _ => match target.strip_prefix(PROXY_PREFIX) {
                Some(path) => self.upstream.relay(writer, path).await,
                None => pages::respond_page(writer, StatusCode::Ok).await,
            },
        }
    }

    async fn serve_video<W>(&self, writer: &mut ResponseWriter<W>) -> Result<(), ResponseError>
    where
        W: AsyncWrite + Unpin,
    {
        let path = self.assets_dir.join(VIDEO_FILE);
        match tokio::fs::read(&path).await {
            Ok(video) => pages::respond(writer, StatusCode::Ok, "video/mp4", &video).await,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read video");
                pages::respond_page(writer, StatusCode::InternalServerError).await
            }
        }
    }
}

impl Handler for DemoHandler {
    fn handle<'a>(
        &'a self,
        writer: &'a mut ResponseWriter<TcpStream>,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), ResponseError>> {
        Box::pin(self.route(writer, request))
    }
}
