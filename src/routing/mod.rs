//! Key-based routing: resolve a target identifier, forward the query.

pub mod forwarder;
pub mod query;
pub mod resolver;

pub use forwarder::{DownstreamResponse, Forwarder};
pub use query::{has_content, InboundQuery, MalformedQuery, TargetSource};
pub use resolver::Resolver;
