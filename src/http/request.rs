//! Incremental HTTP/1.1 request parsing.
//!
//! # Responsibilities
//! - Parse and validate the request line (method, target, version)
//! - Drive header parsing until the empty line
//! - Collect exactly `Content-Length` body bytes
//!
//! # Design Decisions
//! - The parser state is an explicit enum owned by the `Request`
//! - A single `parse` call may advance through several states
//! - Any protocol violation moves the request into a terminal error state

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::headers::{HeaderError, Headers};
use super::{find_crlf, CRLF};

/// Errors raised while parsing or reading a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request line is not exactly three space-separated tokens.
    #[error("malformed request-line: {0:?}")]
    MalformedRequestLine(String),

    /// The method is not one of GET, POST, PUT or DELETE.
    #[error("unsupported method: {0:?}")]
    UnsupportedMethod(String),

    /// The version token is not `HTTP/1.1`.
    #[error("unsupported http version: {0:?}")]
    UnsupportedVersion(String),

    /// A header field-line could not be parsed.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// A previous call already failed.
    #[error("request in error state")]
    RequestInErrorState,

    /// The stream ended before `Content-Length` body bytes arrived.
    #[error("incomplete body: expected {expected} bytes, received {received}")]
    IncompleteBody { expected: usize, received: usize },

    /// A body is expected but its length cannot be determined.
    #[error("unsupported body framing")]
    UnsupportedBodyFraming,

    /// The `Content-Length` value is not a decimal byte count.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// The stream ended before the request head was complete.
    #[error("connection closed before request was complete")]
    UnexpectedEof,

    /// A single line does not fit in the accumulation buffer.
    #[error("request line or header exceeds buffer capacity of {capacity} bytes")]
    BufferFull { capacity: usize },

    /// Reading from the stream failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::MalformedRequestLine(_) => "malformed_request_line",
            RequestError::UnsupportedMethod(_) => "unsupported_method",
            RequestError::UnsupportedVersion(_) => "unsupported_version",
            RequestError::Header(HeaderError::MalformedFieldLine(_)) => "malformed_field_line",
            RequestError::Header(HeaderError::MalformedFieldName(_)) => "malformed_field_name",
            RequestError::Header(HeaderError::MalformedHeaderName(_)) => "malformed_header_name",
            RequestError::RequestInErrorState => "request_in_error_state",
            RequestError::IncompleteBody { .. } => "incomplete_body",
            RequestError::UnsupportedBodyFraming => "unsupported_body_framing",
            RequestError::InvalidContentLength(_) => "invalid_content_length",
            RequestError::UnexpectedEof => "unexpected_eof",
            RequestError::BufferFull { .. } => "buffer_full",
            RequestError::Io(_) => "io",
        }
    }
}

/// Supported request methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(RequestError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed first line of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    /// Version without the `HTTP/` prefix; always `"1.1"` once parsed.
    pub http_version: String,
}

/// Parser progress for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Waiting for the request line.
    Init,
    /// Parsing header field-lines.
    Headers,
    /// Collecting body bytes up to `content_length`.
    Body { content_length: usize },
    /// Request fully parsed.
    Done,
    /// Parsing failed; the request is unusable.
    Error,
}

/// Strip and check the `HTTP/` scheme prefix, returning the bare version.
fn parse_version(token: &str) -> Result<String, RequestError> {
    match token.split_once('/') {
        Some(("HTTP", "1.1")) => Ok("1.1".to_string()),
        _ => Err(RequestError::UnsupportedVersion(token.to_string())),
    }
}

/// Parse a CRLF-terminated request line from the front of `data`.
///
/// Returns `Ok(None)` when no CRLF has arrived yet, otherwise the request line
/// and the number of bytes it occupied including the CRLF.
pub fn parse_request_line(data: &[u8]) -> Result<Option<(RequestLine, usize)>, RequestError> {
    let Some(idx) = find_crlf(data) else {
        return Ok(None);
    };

    let raw = &data[..idx];
    let line = std::str::from_utf8(raw).map_err(|_| {
        RequestError::MalformedRequestLine(String::from_utf8_lossy(raw).into_owned())
    })?;

    let parts: Vec<&str> = line.split(' ').collect();
    let [method, target, version] = parts.as_slice() else {
        return Err(RequestError::MalformedRequestLine(line.to_string()));
    };

    let request_line = RequestLine {
        method: method.parse()?,
        target: target.to_string(),
        http_version: parse_version(version)?,
    };

    Ok(Some((request_line, idx + CRLF.len())))
}

/// Parse a `Content-Length` value. Only plain decimal digits are accepted.
fn parse_content_length(value: &str) -> Result<usize, RequestError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RequestError::InvalidContentLength(value.to_string()));
    }
    value
        .parse()
        .map_err(|_| RequestError::InvalidContentLength(value.to_string()))
}

/// An HTTP request, filled in progressively by [`Request::parse`].
#[derive(Debug, Clone)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
    state: ParserState,
}

impl Request {
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_line: RequestLine::default(),
            headers: Headers::new(),
            body: Vec::new(),
            state: ParserState::Init,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParserState::Done
    }

    pub fn method(&self) -> Method {
        self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }

    /// Feed the unconsumed bytes of the accumulation buffer to the parser.
    ///
    /// Returns how many bytes were consumed. The caller drops those bytes and
    /// passes the remainder, plus any newly read bytes, on the next call.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize, RequestError> {
        let mut consumed = 0;
        loop {
            let remaining = &data[consumed..];
            let step = match self.state {
                ParserState::Error => return Err(RequestError::RequestInErrorState),
                ParserState::Done => break,
                _ if remaining.is_empty() => break,
                ParserState::Init => self.parse_request_line(remaining),
                ParserState::Headers => self.parse_headers(remaining),
                ParserState::Body { content_length } => self.parse_body(remaining, content_length),
            };

            match step {
                Ok(0) => break,
                Ok(n) => consumed += n,
                Err(e) => {
                    self.state = ParserState::Error;
                    return Err(e);
                }
            }
        }
        Ok(consumed)
    }

    fn parse_request_line(&mut self, data: &[u8]) -> Result<usize, RequestError> {
        match parse_request_line(data)? {
            Some((request_line, n)) => {
                self.request_line = request_line;
                self.state = ParserState::Headers;
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn parse_headers(&mut self, data: &[u8]) -> Result<usize, RequestError> {
        let (n, done) = self.headers.parse(data)?;
        if done {
            self.state = match self.body_length()? {
                Some(content_length) => ParserState::Body { content_length },
                None => ParserState::Done,
            };
        }
        Ok(n)
    }

    fn parse_body(&mut self, data: &[u8], content_length: usize) -> Result<usize, RequestError> {
        if content_length == 0 {
            return Err(RequestError::UnsupportedBodyFraming);
        }

        let take = (content_length - self.body.len()).min(data.len());
        self.body.extend_from_slice(&data[..take]);
        if self.body.len() == content_length {
            self.state = ParserState::Done;
        }
        Ok(take)
    }

    /// Length of the body that follows the header block, if any.
    ///
    /// Any `transfer-encoding` is rejected, even alongside `content-length`.
    fn body_length(&self) -> Result<Option<usize>, RequestError> {
        if self.headers.contains("transfer-encoding") {
            return Err(RequestError::UnsupportedBodyFraming);
        }
        match self.headers.get("content-length") {
            Some(value) => {
                let length = parse_content_length(value)?;
                Ok((length > 0).then_some(length))
            }
            None => Ok(None),
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
