//! Reading one request from a byte stream.
//!
//! # Responsibilities
//! - Own the fixed-capacity accumulation buffer for one connection
//! - Feed newly read bytes to the request parser
//! - Compact the buffer after each parse step
//!
//! # Design Decisions
//! - The buffer never grows. A request line or header that does not fit is
//!   reported as `BufferFull` rather than stalling the connection.
//! - End of stream before the request is done is always an error

use tokio::io::{AsyncRead, AsyncReadExt};

use super::request::{ParserState, Request, RequestError};

/// Default accumulation buffer capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Bounded byte window holding bytes read but not yet parsed.
#[derive(Debug)]
struct AccumulationBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl AccumulationBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn free_tail(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    fn advance(&mut self, n: usize) {
        self.len += n;
    }

    /// Drop the first `n` bytes and move the remainder to the front.
    fn consume(&mut self, n: usize) {
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }
}

/// Reads a single request from a stream using a bounded buffer.
#[derive(Debug, Clone, Copy)]
pub struct RequestReader {
    buffer_size: usize,
}

impl RequestReader {
    /// Create a reader whose accumulation buffer holds `buffer_size` bytes.
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Read from `stream` until a complete request has been parsed.
    pub async fn read_request<R>(&self, stream: &mut R) -> Result<Request, RequestError>
    where
        R: AsyncRead + Unpin,
    {
        let mut request = Request::new();
        let mut buffer = AccumulationBuffer::new(self.buffer_size);

        while !request.is_done() {
            if buffer.is_full() {
                return Err(RequestError::BufferFull {
                    capacity: buffer.capacity(),
                });
            }

            let n = stream.read(buffer.free_tail()).await?;
            if n == 0 {
                return Err(match request.state() {
                    ParserState::Body { content_length } => RequestError::IncompleteBody {
                        expected: content_length,
                        received: request.body.len(),
                    },
                    _ => RequestError::UnexpectedEof,
                });
            }
            buffer.advance(n);

            let consumed = request.parse(buffer.filled())?;
            buffer.consume(consumed);

            tracing::trace!(
                read = n,
                consumed,
                buffered = buffer.len,
                state = ?request.state(),
                "Parse step"
            );
        }

        Ok(request)
    }
}

impl Default for RequestReader {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Read one request with the default buffer size.
pub async fn read_request<R>(stream: &mut R) -> Result<Request, RequestError>
where
    R: AsyncRead + Unpin,
{
    RequestReader::default().read_request(stream).await
}
