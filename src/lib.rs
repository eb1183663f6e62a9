//! Key-based query router.
//!
//! Resolves the target identifier carried by an inbound query (an equipment
//! number, for example) to the base URL of the downstream service that owns
//! it, forwards the original JSON body to `<redirectUrl>/query`, and relays the
//! downstream answer verbatim.
//!
//! # Flow
//!
//! ```text
//! POST /query {"EQUIPMENTNO": "EQT-100", ...}
//!   -> Mapping Store: target == "EQT-100"  => redirectUrl "http://svc-a"
//!   -> POST http://svc-a/query {"EQUIPMENTNO": "EQT-100", ...}
//!   <- downstream JSON, relayed unchanged
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`mapping`]: Mapping Store trait and backends
//! - [`routing`]: Resolver, Forwarder and inbound query parsing
//! - [`api`]: HTTP handlers and router
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod mapping;
pub mod metrics;
pub mod routing;
pub mod utils;

pub use config::Config;
pub use error::{Result, RouterError};
