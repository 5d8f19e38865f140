//! HTTP surface (axum).
//!
//! Every data route runs its operation through the core `SessionRunner`, so
//! retries, eviction and the final error mapping live in one place.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{build_router, AppState};
pub use server::serve;
