//! HTTP/1.1 wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → reader.rs (accumulation buffer, read loop)
//!     → request.rs (request state machine)
//!         → headers.rs (field-line parsing, header store)
//!     → Handler (user supplied)
//!     → response.rs (status line, headers, raw/chunked body, trailers)
//!     → connection closed
//! ```
//!
//! # Design Decisions
//! - Parsing is incremental and independent of how bytes are fragmented
//! - One request per connection; no keep-alive or pipelining
//! - Chunked framing is supported on responses only

pub mod headers;
pub mod reader;
pub mod request;
pub mod response;
pub mod server;

pub use headers::{HeaderError, Headers};
pub use reader::{read_request, RequestReader, DEFAULT_BUFFER_SIZE};
pub use request::{Method, ParserState, Request, RequestError, RequestLine};
pub use response::{default_headers, ResponseError, ResponseWriter, StatusCode};
pub use server::{serve, serve_with_config, BoxFuture, Handler, ServeError, ServerHandle};

/// Field-line and request-line terminator.
pub(crate) const CRLF: &[u8] = b"\r\n";

/// Offset of the first CRLF in `data`, if any.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(CRLF.len()).position(|w| w == CRLF)
}
