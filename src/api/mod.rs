//! HTTP API for Agilow.
//!
//! ## Endpoints
//!
//! - `POST /api/operations` - Apply a batch of extracted operations
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
