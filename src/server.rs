//! Process boundary: bind, wire the services together, and serve

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

/// Running server. Dropping it leaves the tasks running; call [`ServerHandle::stop`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: JoinHandle<std::io::Result<()>>,
    matchmaking_task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address actually bound; differs from the configured one when port 0 was asked for
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop the matchmaking and round loops, then the HTTP server, and wait for all three
    pub async fn stop(mut self) -> anyhow::Result<()> {
        info!("Stopping server");
        self.state.matchmaking.stop();
        self.state.rounds.stop().await;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.server_task.await??;
        if let Err(e) = self.matchmaking_task.await {
            error!(error = %e, "Matchmaking task failed");
        }

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Bind `config.server_addr` and start serving
pub async fn serve(config: Config) -> anyhow::Result<ServerHandle> {
    init_server_time();

    let listener = TcpListener::bind(config.server_addr).await?;
    let local_addr = listener.local_addr()?;

    info!(
        tick_rate = config.game.tick_rate,
        max_workers = config.max_workers,
        "Starting Tower Duel Server"
    );

    let state = AppState::new(config);

    // Spawn matchmaking service
    let matchmaking = state.matchmaking.clone();
    let matchmaking_task = tokio::spawn(async move {
        matchmaking.run().await;
    });

    let router = build_router(state.clone());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    info!("Server listening on {}", local_addr);
    info!("Health check: http://{}/health", local_addr);
    info!("WebSocket endpoint: ws://{}/ws?name=<display name>", local_addr);

    Ok(ServerHandle {
        local_addr,
        state,
        shutdown_tx: Some(shutdown_tx),
        server_task,
        matchmaking_task,
    })
}

/// Serve on `host:port` with default game settings
pub async fn serve_at(host: &str, port: u16, max_workers: usize) -> anyhow::Result<ServerHandle> {
    serve(Config::for_address(host, port, max_workers)?).await
}
