//! Warden server library
//!
//! Thin shell around the PDP: configuration, the query-parameter request
//! builder, and the HTTP façade (`/getDecision`, `/health`). The decision
//! engine itself lives in `warden-pdp`; this crate only wires it to the
//! outside world.

pub mod config;
pub mod error;
pub mod http;
pub mod request_map;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use http::{build_router, AppState};
