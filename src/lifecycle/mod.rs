//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls ServerHandle::close
//!
//! Shutdown (shutdown.rs):
//!     close → trigger → accept loop exits → listening socket released
//! ```
//!
//! # Design Decisions
//! - Closing stops accepting; in-flight connections are not aborted
//! - Draining in-flight connections is left to the caller

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_shutdown_signal;
