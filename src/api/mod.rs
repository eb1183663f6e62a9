//! HTTP API module: the `/query` router plus health and metrics endpoints.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::QueryError;
pub use handlers::{AppState, QuerySettings};
pub use routes::create_router;
