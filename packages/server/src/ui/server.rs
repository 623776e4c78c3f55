//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use doorbridge_shared::time::Clock;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    domain::{CredentialStore, HubRepository},
    infrastructure::repository::InMemoryHubRepository,
    usecase::{
        BroadcastUseCase, IdentifyConnectionUseCase, IdlePollUseCase, RecordAckUseCase,
        RequestUnlockUseCase, SessionUseCase,
    },
};

use super::{
    handler::{health_check, hub_status, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Hub settings that the use cases need.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Shared secret for doorclients; also the HMAC key for webclient tokens.
    pub secret: String,
    /// Token slice length in seconds.
    pub token_valid_secs: u64,
}

/// WebSocket relay hub
///
/// # Example
///
/// ```ignore
/// let server = Server::in_memory(config, Arc::new(store), Arc::new(SystemClock));
/// server.run("0.0.0.0".to_string(), 8001).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Wire every use case to a fresh in-memory hub state.
    pub fn in_memory(
        config: HubConfig,
        credentials: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let repository: Arc<dyn HubRepository> = Arc::new(InMemoryHubRepository::default());
        Self::new(AppState {
            identify_usecase: Arc::new(IdentifyConnectionUseCase::new(
                credentials.clone(),
                config.secret.clone(),
                config.token_valid_secs,
                clock.clone(),
            )),
            request_unlock_usecase: Arc::new(RequestUnlockUseCase::new(
                repository.clone(),
                credentials,
                clock.clone(),
            )),
            record_ack_usecase: Arc::new(RecordAckUseCase::new(repository.clone())),
            broadcast_usecase: Arc::new(BroadcastUseCase::new(repository.clone(), clock.clone())),
            idle_poll_usecase: Arc::new(IdlePollUseCase::new(
                repository.clone(),
                config.secret,
                clock,
            )),
            session_usecase: Arc::new(SessionUseCase::new(repository)),
        })
    }

    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/status", get(hub_status))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on an already bound listener until the process is signalled.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let app = self.router();
        tracing::info!("Relay hub listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Bind `host:port` and serve.
    pub async fn run(self, host: String, port: u16) -> std::io::Result<()> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        self.serve(listener).await
    }
}
