//! Connection server.
//!
//! # Responsibilities
//! - Bind the listening socket
//! - Accept connections and spawn one task per connection
//! - Per connection: read one request, invoke the handler, close
//! - Stop accepting when the handle is closed
//!
//! # Design Decisions
//! - A failed request only closes its own connection
//! - No retries, backpressure or connection limit
//! - Failed accepts back off exponentially, capped at one second
//! - The core never writes error responses on its own; that is up to the handler

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{validate_config, ConfigError, ConnectionConfig, ServerConfig};
use crate::http::reader::RequestReader;
use crate::http::request::{Request, RequestError};
use crate::http::response::{ResponseError, ResponseWriter};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{
    accept_backoff, Acceptor, ConnectionGuard, ConnectionTracker, Listener, ListenerError,
};
use crate::observability::metrics;

/// Error returned when a server cannot be started.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// A boxed future that can be sent across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Application logic invoked once per parsed request.
///
/// The handler drives the [`ResponseWriter`] through status line, headers
/// and body before returning. The connection is closed afterwards.
pub trait Handler: Send + Sync + 'static {
    fn handle<'a>(
        &'a self,
        writer: &'a mut ResponseWriter<TcpStream>,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<(), ResponseError>>;
}

/// Handle to a running server.
///
/// Dropping the handle stops the accept loop as well; [`close`](Self::close)
/// additionally waits for the listening socket to be released.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_loop: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting connections and release the listening socket.
    ///
    /// Connections already accepted run to completion on their own.
    pub async fn close(&mut self) {
        self.shutdown.trigger();
        if let Some(accept_loop) = self.accept_loop.take() {
            if let Err(e) = accept_loop.await {
                tracing::error!(error = %e, "Accept loop terminated abnormally");
            }
            tracing::info!(
                address = %self.local_addr,
                accepted = self.tracker.accepted_count(),
                "Server closed"
            );
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve on all interfaces at `port` with default settings.
pub async fn serve<H: Handler>(port: u16, handler: H) -> Result<ServerHandle, ServeError> {
    serve_with_config(ServerConfig::with_port(port), handler).await
}

/// Bind according to `config` and start accepting connections.
pub async fn serve_with_config<H: Handler>(
    config: ServerConfig,
    handler: H,
) -> Result<ServerHandle, ServeError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    let listener = Listener::bind(&config.listener.bind_address, config.listener.port).await?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    let shutdown = Shutdown::new();
    let tracker = ConnectionTracker::new();
    let accept_loop = tokio::spawn(accept_loop(
        listener,
        Arc::new(handler),
        config.connection,
        tracker.clone(),
        shutdown.subscribe(),
    ));

    Ok(ServerHandle {
        local_addr,
        shutdown,
        tracker,
        accept_loop: Some(accept_loop),
    })
}

async fn accept_loop<A: Acceptor, H: Handler>(
    listener: A,
    handler: Arc<H>,
    settings: ConnectionConfig,
    tracker: ConnectionTracker,
    mut shutdown: ShutdownSignal,
) {
    let mut failures: u32 = 0;
    loop {
        let accepted = tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                failures = 0;
                let guard = tracker.track(peer_addr);
                metrics::record_connection_accepted();
                metrics::record_active_connections(tracker.active_count());

                let span = tracing::info_span!(
                    "connection",
                    connection_id = %guard.id(),
                    peer_addr = %peer_addr,
                );
                tokio::spawn(
                    handle_connection(
                        stream,
                        Arc::clone(&handler),
                        settings.clone(),
                        tracker.clone(),
                        guard,
                    )
                    .instrument(span),
                );
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures);
                metrics::record_accept_error();
                tracing::warn!(
                    error = %e,
                    failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "Accept failed"
                );
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!("Accept loop stopped");
}

async fn read_with_timeout(
    stream: &mut TcpStream,
    settings: &ConnectionConfig,
) -> Result<Request, RequestError> {
    let reader = RequestReader::new(settings.read_buffer_size);
    if settings.read_timeout_secs == 0 {
        return reader.read_request(stream).await;
    }

    let limit = Duration::from_secs(settings.read_timeout_secs);
    match tokio::time::timeout(limit, reader.read_request(stream)).await {
        Ok(result) => result,
        Err(_) => Err(RequestError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "timed out waiting for request",
        ))),
    }
}

async fn handle_connection<H: Handler>(
    mut stream: TcpStream,
    handler: Arc<H>,
    settings: ConnectionConfig,
    tracker: ConnectionTracker,
    guard: ConnectionGuard,
) {
    match read_with_timeout(&mut stream, &settings).await {
        Ok(request) => {
            tracing::debug!(
                method = %request.method(),
                target = %request.target(),
                body_len = request.body.len(),
                "Request parsed"
            );
            metrics::record_request(request.method());

            let mut writer = ResponseWriter::new(stream);
            if let Err(e) = handler.handle(&mut writer, &request).await {
                tracing::error!(error = %e, "Handler failed");
                metrics::record_handler_error();
            }
            if let Err(e) = writer.finish().await {
                tracing::debug!(error = %e, "Failed to close connection cleanly");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = e.kind(), "Failed to read request");
            metrics::record_request_error(e.kind());
        }
    }

    drop(guard);
    metrics::record_active_connections(tracker.active_count());
}
