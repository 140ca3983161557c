//! HTTP server
//!
//! Builds the middleware stack around the router and serves until Ctrl+C or
//! SIGTERM.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
    websocket::WebSocketManager,
};
use crate::broadcast::BroadcastHub;
use crate::chat::ChatResponder;
use crate::config::ServerConfig;
use crate::games::service::BettingService;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

pub struct ApiServer {
    config: ServerConfig,
    service: Arc<BettingService>,
    hub: BroadcastHub,
}

impl ApiServer {
    pub fn new(config: ServerConfig, service: Arc<BettingService>, hub: BroadcastHub) -> Self {
        Self {
            config,
            service,
            hub,
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.socket_addr()?;
        let app = self.create_app();
        let heartbeat = self
            .hub
            .start_heartbeat(Duration::from_secs(self.config.heartbeat_interval_secs.max(1)));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %addr, "Zeppelin server listening");
        self.log_server_info();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        heartbeat.abort();
        served?;

        info!("Server stopped gracefully");
        Ok(())
    }

    pub fn create_app(&self) -> axum::Router {
        let state = build_state(self.service.clone(), self.hub.clone());

        create_router(state)
            // Request ID first so every later layer can see it
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(&self.config.allowed_origins))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    fn log_server_info(&self) {
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        info!("   Heartbeat interval: {}s", self.config.heartbeat_interval_secs);
    }
}

pub fn build_state(service: Arc<BettingService>, hub: BroadcastHub) -> Arc<AppState> {
    let chat = ChatResponder::new(service.clone());
    Arc::new(AppState {
        websocket_manager: Arc::new(WebSocketManager::new(hub, chat.clone())),
        service,
        chat,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
