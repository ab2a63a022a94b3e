//! Control server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::routes::create_router;
use crate::state::AppState;

/// Listen address for the control server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Serves the control router.
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until the process is killed.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then stop accepting connections.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("Control server listening on {}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Control server stopped");
        Ok(())
    }
}
