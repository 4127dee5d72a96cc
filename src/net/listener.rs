//! TCP listener.
//!
//! # Responsibilities
//! - Bind to the configured address and port
//! - Accept incoming TCP connections
//! - Report bind and accept failures as distinct errors
//!
//! There is no connection limit: every accepted connection is
//! handed off immediately.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

/// First pause after a failed accept.
pub const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);
/// Longest pause between accept attempts.
pub const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before retrying after `failures` consecutive accept errors.
///
/// Doubles from [`ACCEPT_BACKOFF_BASE`] and is capped at [`ACCEPT_BACKOFF_MAX`].
pub fn accept_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(failures - 1);
    ACCEPT_BACKOFF_BASE
        .checked_mul(factor)
        .map_or(ACCEPT_BACKOFF_MAX, |delay| delay.min(ACCEPT_BACKOFF_MAX))
}

/// Source of incoming connections for the accept loop.
pub trait Acceptor: Send + Sync + 'static {
    fn accept(
        &self,
    ) -> impl Future<Output = Result<(TcpStream, SocketAddr), ListenerError>> + Send;
}

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
        }
    }
}

/// A bound TCP listener.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind to `bind_address:port`.
    pub async fn bind(bind_address: &str, port: u16) -> Result<Self, ListenerError> {
        let ip: IpAddr = bind_address
            .parse()
            .map_err(|e| {
                ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
            })?;
        let addr = SocketAddr::new(ip, port);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(ListenerError::Bind)?;

        let local_addr = listener
            .local_addr()
            .map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self { inner: listener })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

impl Acceptor for Listener {
    fn accept(
        &self,
    ) -> impl Future<Output = Result<(TcpStream, SocketAddr), ListenerError>> + Send {
        Listener::accept(self)
    }
}
