use std::net::SocketAddr;
use std::sync::Arc;

use iris_index::QueryEngine;
use iris_llm::{AnyEmbedder, AnyGenerator, GenerationClient};
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::{RateLimits, build_router};

/// Shared, read-only service context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine<AnyEmbedder>>,
    pub generation: Arc<GenerationClient<AnyGenerator>>,
}

impl AppState {
    #[must_use]
    pub fn new(engine: QueryEngine<AnyEmbedder>, generation: GenerationClient<AnyGenerator>) -> Self {
        Self {
            engine: Arc::new(engine),
            generation: Arc::new(generation),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    rate_limits: RateLimits,
    max_body_size: usize,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(bind: &str, port: u16, state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        Self {
            addr,
            rate_limits: RateLimits::default(),
            max_body_size: 10 * 1024 * 1024,
            state,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_rate_limits(mut self, limits: RateLimits) -> Self {
        self.rate_limits = limits;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Serve until the shutdown channel flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(self.state, self.rate_limits, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("server shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use iris_index::IndexState;
    use iris_llm::mock::{MockEmbedder, MockGenerator};

    use super::*;

    fn state() -> AppState {
        AppState::new(
            QueryEngine::new(
                AnyEmbedder::Mock(MockEmbedder::default()),
                IndexState::Unloaded,
                2,
            ),
            GenerationClient::new(
                AnyGenerator::Mock(MockGenerator::default()),
                Duration::from_secs(5),
            ),
        )
    }

    #[test]
    fn server_builder_chain() {
        let (_tx, rx) = watch::channel(false);
        let limits = RateLimits {
            text: 1,
            image: 2,
            default: 3,
        };
        let server = GatewayServer::new("127.0.0.1", 8090, state(), rx)
            .with_rate_limits(limits)
            .with_max_body_size(512);

        assert_eq!(server.rate_limits, limits);
        assert_eq!(server.max_body_size, 512);
        assert_eq!(server.addr.port(), 8090);
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_tx, rx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, state(), rx);
        assert_eq!(server.addr, SocketAddr::from(([127, 0, 0, 1], 9999)));
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (tx, rx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 0, state(), rx);
        let handle = tokio::spawn(server.serve());
        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
