//! HTTP/1.1 over raw TCP streams.
//!
//! An incremental request parser, a case-insensitive header store and a
//! response writer with chunked bodies and trailers, driven by a TCP accept
//! loop that hands every parsed request to a user supplied [`Handler`].

pub mod config;
pub mod demo;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::ServerConfig;
pub use http::{
    serve, serve_with_config, Handler, Headers, Request, ResponseWriter, ServeError, ServerHandle,
    StatusCode,
};
pub use lifecycle::Shutdown;
