use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drivegate::{config::Config, router, services::auth::SessionManager, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::from_config(config).await?;
    tracing::info!("✅ AppState initialized");

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_sessions(
        state.sessions.clone(),
        state.config.sweep_interval(),
        shutdown.clone(),
    ));
    tracing::info!(
        "✅ Session sweeper started (every {}s)",
        state.config.session_sweep_interval_secs
    );

    let addr = state.config.bind_addr;
    let grace = state.config.shutdown_grace();
    let pool = state.db.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        router::build(state, true).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = drain_tx.send(());
    });

    let mut server = std::pin::pin!(server.into_future());
    tokio::select! {
        biased;
        result = &mut server => result?,
        Ok(()) = drain_rx => {
            tracing::info!("🛑 Shutdown requested, draining for up to {}s", grace.as_secs());
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result?,
                Err(_) => tracing::warn!("⚠️ Drain deadline exceeded, dropping open connections"),
            }
        }
    }

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!("❌ Session sweeper task failed: {}", e);
    }

    if let Some(pool) = pool {
        pool.close();
        tracing::info!("✅ Database pool closed");
    }

    tracing::info!("✅ Shutdown complete");
    Ok(())
}

/// Periodically deletes expired sessions until `shutdown` fires.
async fn sweep_sessions(
    sessions: Arc<SessionManager>,
    every: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                tracing::info!("🧹 Sweeping expired sessions...");
                match sessions.sweep_expired().await {
                    Ok(removed) => tracing::info!("✅ Removed {} expired sessions", removed),
                    Err(e) => tracing::error!("❌ Session sweep failed: {}", e),
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
