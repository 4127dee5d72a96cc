//! Response encoding.
//!
//! # Responsibilities
//! - Write the status line for the supported status codes
//! - Serialize header blocks (and trailers after a chunked body)
//! - Pass raw body bytes through, or frame them as chunks
//!
//! # Design Decisions
//! - The writer tracks its phase and rejects calls made out of order
//! - Chunk framing is byte-identical to `HEX CRLF data CRLF`
//! - Hashing or other trailer content is the handler's concern

use std::fmt;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::headers::Headers;

/// Errors raised while writing a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// An operation was called in the wrong phase.
    #[error("{operation} is not valid while writing the {phase}")]
    OutOfOrder {
        operation: &'static str,
        phase: WriterPhase,
    },

    /// Trailers were written without `Transfer-Encoding: chunked` and a
    /// `Trailer` header in the response head.
    #[error("trailers were not announced in the response headers")]
    TrailersNotAnnounced,

    /// Writing to the stream failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Status codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    BadRequest,
    InternalServerError,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// Which part of the response the writer expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterPhase {
    StatusLine,
    Headers,
    Body,
    Trailers,
    Done,
}

impl fmt::Display for WriterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterPhase::StatusLine => "status line",
            WriterPhase::Headers => "headers",
            WriterPhase::Body => "body",
            WriterPhase::Trailers => "trailers",
            WriterPhase::Done => "finished response",
        };
        f.write_str(name)
    }
}

/// Headers for a plain-text response with a body of `content_length` bytes.
pub fn default_headers(content_length: usize) -> Headers {
    let mut headers = Headers::new();
    headers.set("Content-Length", content_length.to_string());
    headers.set("Connection", "close");
    headers.set("Content-Type", "text/plain");
    headers
}

/// Serialize a header block, including the terminating empty line.
fn encode_headers(headers: &Headers) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

fn is_chunked(headers: &Headers) -> bool {
    headers
        .get("transfer-encoding")
        .map(|te| te.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked")))
        .unwrap_or(false)
}

/// Writes one HTTP/1.1 response to an output stream.
///
/// Calls must follow the order: status line, headers, body, and for chunked
/// responses that announced a `Trailer` header, one trailer block.
#[derive(Debug)]
pub struct ResponseWriter<W> {
    writer: W,
    phase: WriterPhase,
    chunked: bool,
    trailers_announced: bool,
    // Set once the body is framed through `write_chunk`.
    framed_chunks: bool,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            phase: WriterPhase::StatusLine,
            chunked: false,
            trailers_announced: false,
            framed_chunks: false,
        }
    }

    pub fn phase(&self) -> WriterPhase {
        self.phase
    }

    /// Whether the response head declared `Transfer-Encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    fn require_phase(
        &self,
        operation: &'static str,
        phase: WriterPhase,
    ) -> Result<(), ResponseError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(ResponseError::OutOfOrder {
                operation,
                phase: self.phase,
            })
        }
    }

    /// Write `HTTP/1.1 <code> <reason>\r\n`.
    pub async fn write_status_line(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.require_phase("write_status_line", WriterPhase::StatusLine)?;
        let line = format!("HTTP/1.1 {status}\r\n");
        self.writer.write_all(line.as_bytes()).await?;
        self.phase = WriterPhase::Headers;
        Ok(())
    }

    /// Write a header block.
    ///
    /// The first call writes the response head. After a chunked body has
    /// been terminated a second call writes the trailer block.
    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), ResponseError> {
        match self.phase {
            WriterPhase::Headers => {
                self.chunked = is_chunked(headers);
                self.trailers_announced = self.chunked && headers.contains("trailer");
            }
            WriterPhase::Body if self.framed_chunks => {
                return Err(ResponseError::OutOfOrder {
                    operation: "write_headers",
                    phase: WriterPhase::Body,
                })
            }
            WriterPhase::Body | WriterPhase::Trailers if self.chunked => {
                if !self.trailers_announced {
                    return Err(ResponseError::TrailersNotAnnounced);
                }
            }
            phase => {
                return Err(ResponseError::OutOfOrder {
                    operation: "write_headers",
                    phase,
                })
            }
        }

        self.writer.write_all(&encode_headers(headers)).await?;
        self.phase = match self.phase {
            WriterPhase::Headers => WriterPhase::Body,
            _ => WriterPhase::Done,
        };
        Ok(())
    }

    /// Write raw body bytes.
    ///
    /// For chunked responses the caller frames chunks itself, or uses
    /// [`write_chunk`](Self::write_chunk).
    pub async fn write_body(&mut self, body: &[u8]) -> Result<usize, ResponseError> {
        self.require_phase("write_body", WriterPhase::Body)?;
        self.writer.write_all(body).await?;
        Ok(body.len())
    }

    /// Write one chunk as `HEX-LENGTH CRLF data CRLF`.
    ///
    /// Empty input writes nothing, since a zero-length chunk ends the body.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<usize, ResponseError> {
        self.require_phase("write_chunk", WriterPhase::Body)?;
        self.framed_chunks = true;
        if data.is_empty() {
            return Ok(0);
        }
        let mut frame = format!("{:X}\r\n", data.len()).into_bytes();
        frame.extend_from_slice(data);
        frame.extend_from_slice(b"\r\n");
        self.writer.write_all(&frame).await?;
        Ok(data.len())
    }

    /// Write the terminating `0\r\n` chunk.
    ///
    /// Without announced trailers the empty line that ends the message is
    /// written too; otherwise it comes with the trailer block.
    pub async fn write_chunked_body_done(&mut self) -> Result<(), ResponseError> {
        self.require_phase("write_chunked_body_done", WriterPhase::Body)?;
        self.writer.write_all(b"0\r\n").await?;
        if self.trailers_announced {
            self.phase = WriterPhase::Trailers;
        } else {
            self.writer.write_all(b"\r\n").await?;
            self.phase = WriterPhase::Done;
        }
        Ok(())
    }

    /// Flush buffered output and shut down the write half.
    pub async fn finish(&mut self) -> Result<(), ResponseError> {
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> ResponseWriter<Vec<u8>> {
        ResponseWriter::new(Vec::new())
    }

    #[tokio::test]
    async fn writes_plain_response() {
        let body = b"hello world!\n";
        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&default_headers(body.len())).await.unwrap();
        w.write_body(body).await.unwrap();

        let expected = concat!(
            "HTTP/1.1 200 OK\r\n",
            "content-length: 13\r\n",
            "connection: close\r\n",
            "content-type: text/plain\r\n",
            "\r\n",
            "hello world!\n",
        );
        assert_eq!(w.into_inner(), expected.as_bytes());
    }

    #[tokio::test]
    async fn status_lines() {
        for (status, line) in [
            (StatusCode::Ok, "HTTP/1.1 200 OK\r\n"),
            (StatusCode::BadRequest, "HTTP/1.1 400 Bad Request\r\n"),
            (StatusCode::InternalServerError, "HTTP/1.1 500 Internal Server Error\r\n"),
        ] {
            let mut w = writer();
            w.write_status_line(status).await.unwrap();
            assert_eq!(w.into_inner(), line.as_bytes());
        }
    }

    #[tokio::test]
    async fn modified_default_headers() {
        let mut headers = default_headers(0);
        headers.replace("Content-Type", "text/html");
        headers.replace("content-length", "5");
        headers.remove("connection");
        let mut w = writer();
        w.write_status_line(StatusCode::BadRequest).await.unwrap();
        w.write_headers(&headers).await.unwrap();
        w.write_body(b"oops!").await.unwrap();
        assert_eq!(
            w.into_inner(),
            b"HTTP/1.1 400 Bad Request\r\ncontent-length: 5\r\ncontent-type: text/html\r\n\r\noops!"
        );
    }

    #[tokio::test]
    async fn chunked_body_with_trailers() {
        let mut headers = Headers::new();
        headers.set("Transfer-Encoding", "chunked");
        headers.set("Trailer", "X-Checksum");
        let mut trailers = Headers::new();
        trailers.set("X-Checksum", "abc");

        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&headers).await.unwrap();
        assert!(w.is_chunked());
        w.write_chunk(b"hello").await.unwrap();
        w.write_chunk(&[b'x'; 26]).await.unwrap();
        w.write_chunked_body_done().await.unwrap();
        w.write_headers(&trailers).await.unwrap();
        assert_eq!(w.phase(), WriterPhase::Done);

        let expected = [
            &b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\ntrailer: X-Checksum\r\n\r\n"[..],
            b"5\r\nhello\r\n",
            b"1A\r\n",
            &[b'x'; 26],
            b"\r\n0\r\nx-checksum: abc\r\n\r\n",
        ]
        .concat();
        assert_eq!(w.into_inner(), expected);
    }

    #[tokio::test]
    async fn write_chunk_matches_manual_framing() {
        let data = b"0123456789abcdef0123";
        let mut head = Headers::new();
        head.set("Transfer-Encoding", "chunked");

        let mut framed = writer();
        framed.write_status_line(StatusCode::Ok).await.unwrap();
        framed.write_headers(&head).await.unwrap();
        framed.write_chunk(data).await.unwrap();
        framed.write_chunked_body_done().await.unwrap();

        let mut manual = writer();
        manual.write_status_line(StatusCode::Ok).await.unwrap();
        manual.write_headers(&head).await.unwrap();
        manual.write_body(b"14\r\n").await.unwrap();
        manual.write_body(data).await.unwrap();
        manual.write_body(b"\r\n").await.unwrap();
        manual.write_body(b"0\r\n\r\n").await.unwrap();

        assert_eq!(framed.into_inner(), manual.into_inner());
    }

    #[tokio::test]
    async fn empty_chunk_is_skipped() {
        let mut head = Headers::new();
        head.set("Transfer-Encoding", "chunked");
        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&head).await.unwrap();
        let before = w.get_ref().len();
        assert_eq!(w.write_chunk(b"").await.unwrap(), 0);
        assert_eq!(w.get_ref().len(), before);
    }

    #[tokio::test]
    async fn rejects_out_of_order_calls() {
        let mut w = writer();
        assert!(matches!(
            w.write_headers(&Headers::new()).await,
            Err(ResponseError::OutOfOrder { phase: WriterPhase::StatusLine, .. })
        ));
        assert!(matches!(
            w.write_body(b"x").await,
            Err(ResponseError::OutOfOrder { .. })
        ));
        w.write_status_line(StatusCode::Ok).await.unwrap();
        assert!(matches!(
            w.write_status_line(StatusCode::Ok).await,
            Err(ResponseError::OutOfOrder { phase: WriterPhase::Headers, .. })
        ));
    }

    #[tokio::test]
    async fn trailers_require_announcement() {
        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&default_headers(2)).await.unwrap();
        w.write_body(b"hi").await.unwrap();
        assert!(matches!(
            w.write_headers(&Headers::new()).await,
            Err(ResponseError::OutOfOrder { phase: WriterPhase::Body, .. })
        ));

        let mut head = Headers::new();
        head.set("Transfer-Encoding", "chunked");
        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&head).await.unwrap();
        assert!(matches!(
            w.write_headers(&Headers::new()).await,
            Err(ResponseError::TrailersNotAnnounced)
        ));
    }

    #[tokio::test]
    async fn trailers_wait_for_terminating_chunk() {
        let mut head = default_headers(0);
        head.remove("Content-Length");
        head.set("Transfer-Encoding", "chunked");
        head.set("Trailer", "X-Sum");
        let mut trailers = Headers::new();
        trailers.set("X-Sum", "1");

        let mut w = writer();
        w.write_status_line(StatusCode::Ok).await.unwrap();
        w.write_headers(&head).await.unwrap();
        w.write_chunk(b"hello").await.unwrap();
        let written = w.get_ref().len();

        assert!(matches!(
            w.write_headers(&trailers).await,
            Err(ResponseError::OutOfOrder {
                operation: "write_headers",
                phase: WriterPhase::Body
            })
        ));
        assert_eq!(w.get_ref().len(), written);
        assert_eq!(w.phase(), WriterPhase::Body);

        w.write_chunked_body_done().await.unwrap();
        w.write_headers(&trailers).await.unwrap();
        assert!(w.get_ref().ends_with(b"5\r\nhello\r\n0\r\nx-sum: 1\r\n\r\n"));
        assert_eq!(w.phase(), WriterPhase::Done);
    }
}
