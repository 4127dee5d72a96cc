//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http/server.rs, net/, binaries produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every connection is logged inside a span carrying its connection id
//! - Metrics are disabled unless configured

pub mod logging;
pub mod metrics;
