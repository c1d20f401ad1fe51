use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{health, query_image, query_text};
use crate::limiter::{RATE_WINDOW, RateLimiter};
use crate::server::AppState;

/// Requests per minute per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub text: u32,
    pub image: u32,
    /// Any route other than the query endpoints and `/health`.
    pub default: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            text: 60,
            image: 30,
            default: 30,
        }
    }
}

impl RateLimits {
    /// Limit bucket for a request path; `None` for exempt routes.
    fn for_path(&self, path: &str) -> Option<(&'static str, u32)> {
        match path {
            "/health" => None,
            "/query/text" => Some(("text", self.text)),
            "/query/image" => Some(("image", self.image)),
            _ => Some(("default", self.default)),
        }
    }
}

#[derive(Clone)]
struct RateLimitState {
    limits: RateLimits,
    limiter: RateLimiter,
}

/// Build the service router. Exposed so tests can drive it without a socket.
pub fn build_router(state: AppState, limits: RateLimits, max_body_size: usize) -> Router {
    let rate_state = RateLimitState {
        limits,
        limiter: RateLimiter::new(RATE_WINDOW),
    };

    Router::new()
        .route("/query/text", post(query_text))
        .route("/query/image", post(query_image))
        .route("/health", get(health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            rate_state,
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
}

async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some((route, limit)) = state.limits.for_path(req.uri().path()) else {
        return next.run(req).await;
    };

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    if !state.limiter.check(route, ip, limit, Instant::now()).await {
        tracing::debug!("rate limit exceeded for {ip} on {route}");
        return ApiError::RateLimited.into_response();
    }

    next.run(req).await
}
