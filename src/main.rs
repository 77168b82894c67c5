use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use whatsapp_dispatch_service::config::Settings;
use whatsapp_dispatch_service::server::{create_app, AppState};
use whatsapp_dispatch_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!(
        storage = %settings.storage.backend,
        queue = %settings.queue.backend,
        otp = %settings.otp.backend,
        gateway = %settings.gateway.kind,
        "Configuration loaded"
    );

    let state = AppState::from_settings(settings.clone()).await?;
    tracing::info!("Application state initialized");

    // Single consumer for the whole process
    let worker = if settings.worker.enabled {
        Some(state.dispatch_worker().spawn())
    } else {
        tracing::warn!("Dispatch worker disabled, queued jobs will not be sent");
        None
    };

    let app = create_app(state.clone());

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = worker {
        tracing::info!("Waiting for dispatch worker to finish in-flight job...");
        match worker.shutdown().await {
            Ok(summary) => tracing::info!(
                processed = summary.processed,
                sent = summary.sent,
                failed = summary.failed,
                "Dispatch worker joined"
            ),
            Err(e) => tracing::error!(error = %e, "Dispatch worker panicked"),
        }
    }

    if let Some(pool) = &state.postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
