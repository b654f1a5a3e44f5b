//! HTTP API layer for civiccare.
//!
//! - **Endpoints**: account and complaint routes, mounted under `/api`
//! - **Extractors**: the authenticated caller
//! - **Middleware**: bearer token authentication and shared state
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
