//! Connection identity and in-flight accounting.
//!
//! Connections share nothing but the tracker's counters; each one owns its
//! stream, read buffer and request exclusively.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Identifier assigned to each accepted connection, in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Hands out connection ids and counts connections still being handled.
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    next_id: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection from `peer_addr`.
    ///
    /// The connection counts as active until the returned guard is dropped.
    pub fn track(&self, peer_addr: SocketAddr) -> ConnectionGuard {
        // Ids start at 1.
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            in_flight: Arc::clone(&self.in_flight),
            id,
            peer_addr,
            accepted_at: Instant::now(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Total number of connections accepted so far.
    pub fn accepted_count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

/// Keeps a connection counted as active while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    in_flight: Arc<AtomicU64>,
    id: ConnectionId,
    peer_addr: SocketAddr,
    accepted_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(
            connection_id = %self.id,
            peer_addr = %self.peer_addr,
            elapsed_ms = self.accepted_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}
