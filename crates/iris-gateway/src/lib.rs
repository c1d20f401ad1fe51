//! HTTP query service: text and image questions, health, per-address rate limit.

mod error;
mod handlers;
mod limiter;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use router::{RateLimits, build_router};
pub use server::{AppState, GatewayServer};
