//! Shared store service execution logic.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::domain::SharedStore;

use super::{
    handler::{
        acquire_lock, delete_value, get_value, health_check, list_keys, publish, release_lock,
        set_value, subscribe_handler,
    },
    signal::shutdown_signal,
    state::StoreState,
};

/// Shared store service
///
/// Exposes a `SharedStore` to every game server instance. Game servers reach
/// it through `RemoteStore`.
///
/// # Example
///
/// ```ignore
/// let server = StoreServer::new(Arc::new(InMemoryStore::new()));
/// server.run("127.0.0.1".to_string(), 6380).await?;
/// ```
pub struct StoreServer {
    state: Arc<StoreState>,
}

impl StoreServer {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            state: Arc::new(StoreState { store }),
        }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/store/health", get(health_check))
            .route(
                "/store/value",
                get(get_value).put(set_value).delete(delete_value),
            )
            .route("/store/keys", get(list_keys))
            .route("/store/publish", post(publish))
            .route("/store/subscribe", get(subscribe_handler))
            .route("/store/lock/acquire", post(acquire_lock))
            .route("/store/lock/release", post(release_lock))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the store service until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Store service listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Store service shutdown complete");

        Ok(())
    }

    /// Serve on an already bound listener (no signal handling)
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, self.router()).await
    }
}
